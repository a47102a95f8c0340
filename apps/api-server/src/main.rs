//! # Tollgate API Server
//!
//! Actix-web server with sliding-window rate limiting in front of every
//! non-exempt route.

use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use anyhow::Context;
use tracing_actix_web::TracingLogger;

mod config;
mod handlers;
mod middleware;
mod observability;
mod state;
mod telemetry;

#[cfg(test)]
mod test_support;

use config::AppConfig;
use middleware::rate_limit::RateLimitMiddleware;
use observability::{RateLimitMetrics, RequestIdMiddleware};
use state::AppState;
use telemetry::{TelemetryConfig, init_telemetry};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env().context("invalid configuration")?;

    tracing::info!(
        host = %config.host,
        port = config.port,
        environment = %config.environment,
        api_prefix = %config.api_prefix,
        metrics_path = %config.metrics_path,
        "Starting Tollgate API Server"
    );

    let metrics = Arc::new(RateLimitMetrics::new().context("failed to register metrics")?);
    let state = AppState::build(&config, metrics)
        .await
        .context("failed to initialize rate limiter")?;

    let api_prefix = config.api_prefix.clone();
    let metrics_path = config.metrics_path.clone();
    let request_id_header = config.request_id_header.clone();

    HttpServer::new(move || {
        // Last wrap runs first: logger, then request id, then the limiter.
        App::new()
            .wrap(RateLimitMiddleware::new(
                state.limiter.clone(),
                state.rate_limit.clone(),
                state.metrics.clone(),
            ))
            .wrap(RequestIdMiddleware::new(&request_id_header))
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(|cfg| handlers::configure_routes(cfg, &api_prefix, &metrics_path))
            .default_service(web::to(handlers::not_found))
    })
    .bind((config.host.as_str(), config.port))
    .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?
    .run()
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}
