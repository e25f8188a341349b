//! Metrics collection for observability
//!
//! Prometheus metrics for the reconciliation engine, kept in a private
//! registry so several engines (and tests) can coexist in one process.
//!
//! # Metrics
//!
//! - `settlement_checks_total{outcome}` - Checks by outcome
//! - `settlement_credits_awarded_total` - Base credits granted
//! - `settlement_referral_activations_total` - Referrals activated by a settlement
//! - `settlement_feed_failures_total` - Feed queries that failed
//! - `settlement_feed_query_seconds` - Feed query latency

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone, Debug)]
pub struct Metrics {
    /// Checks by outcome
    pub checks_total: IntCounterVec,

    /// Base credits granted
    pub credits_awarded: IntCounter,

    /// Referral activations
    pub referral_activations: IntCounter,

    /// Failed feed queries
    pub feed_failures: IntCounter,

    /// Feed query latency
    pub feed_query_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let checks_total = IntCounterVec::new(
            Opts::new("settlement_checks_total", "Invoice checks by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(checks_total.clone()))?;

        let credits_awarded = IntCounter::new(
            "settlement_credits_awarded_total",
            "Base credits granted by settlements",
        )?;
        registry.register(Box::new(credits_awarded.clone()))?;

        let referral_activations = IntCounter::new(
            "settlement_referral_activations_total",
            "Referrals activated by a settlement",
        )?;
        registry.register(Box::new(referral_activations.clone()))?;

        let feed_failures = IntCounter::new(
            "settlement_feed_failures_total",
            "Feed queries that failed",
        )?;
        registry.register(Box::new(feed_failures.clone()))?;

        let feed_query_duration = Histogram::with_opts(
            HistogramOpts::new("settlement_feed_query_seconds", "Feed query latency")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        registry.register(Box::new(feed_query_duration.clone()))?;

        Ok(Self {
            checks_total,
            credits_awarded,
            referral_activations,
            feed_failures,
            feed_query_duration,
            registry,
        })
    }

    /// Record a finished check
    pub fn record_check(&self, outcome: &str) {
        self.checks_total.with_label_values(&[outcome]).inc();
    }

    /// Record a settlement this engine applied
    pub fn record_settlement(&self, credits: i64, activated_referral: bool) {
        if credits > 0 {
            self.credits_awarded.inc_by(credits as u64);
        }
        if activated_referral {
            self.referral_activations.inc();
        }
    }

    /// Record a failed feed query
    pub fn record_feed_failure(&self) {
        self.feed_failures.inc();
    }

    /// Record feed query latency
    pub fn record_feed_query(&self, duration_seconds: f64) {
        self.feed_query_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
