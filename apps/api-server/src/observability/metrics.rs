//! Prometheus metrics for rate-limit decisions.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Outcome label values for `tollgate_rate_limit_decisions_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied,
    Exempt,
    /// The store failed; the request went through or not per the failure policy.
    StoreError,
}

impl Decision {
    fn as_label(&self) -> &'static str {
        match self {
            Decision::Allowed => "allowed",
            Decision::Denied => "denied",
            Decision::Exempt => "exempt",
            Decision::StoreError => "store_error",
        }
    }
}

/// Limiter counters on their own registry, exposed at the metrics path.
pub struct RateLimitMetrics {
    registry: Registry,
    decisions: IntCounterVec,
    check_duration: Histogram,
}

impl RateLimitMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let decisions = IntCounterVec::new(
            Opts::new(
                "tollgate_rate_limit_decisions_total",
                "Rate-limit decisions by outcome",
            ),
            &["outcome"],
        )?;
        let check_duration = Histogram::with_opts(
            HistogramOpts::new(
                "tollgate_rate_limit_check_duration_seconds",
                "Time spent asking the window store for a decision",
            )
            .buckets(vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5]),
        )?;

        registry.register(Box::new(decisions.clone()))?;
        registry.register(Box::new(check_duration.clone()))?;

        // Pre-create every outcome so scrapes see zeroes instead of gaps.
        for decision in [
            Decision::Allowed,
            Decision::Denied,
            Decision::Exempt,
            Decision::StoreError,
        ] {
            decisions.with_label_values(&[decision.as_label()]);
        }

        Ok(Self {
            registry,
            decisions,
            check_duration,
        })
    }

    pub fn record(&self, decision: Decision) {
        self.decisions
            .with_label_values(&[decision.as_label()])
            .inc();
    }

    pub fn observe_check(&self, seconds: f64) {
        self.check_duration.observe(seconds);
    }

    pub fn count(&self, decision: Decision) -> u64 {
        self.decisions
            .with_label_values(&[decision.as_label()])
            .get()
    }

    /// Encode every metric in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
