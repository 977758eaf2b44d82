//! ---
//! gw_section: "01-core-functionality"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Catalog synchronization and command translation core."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

/// Counters published by the gateway core.
#[derive(Clone)]
pub struct GatewayMetrics {
    remote_calls: IntCounterVec,
    points_synchronized: IntCounter,
    scrape_batches_failed: IntCounter,
}

impl GatewayMetrics {
    /// Register all gateway metrics with the provided registry.
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let remote_calls = IntCounterVec::new(
            Opts::new(
                "nfgw_remote_calls_total",
                "Remote catalog, command, and time-series calls by operation and outcome",
            ),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(remote_calls.clone()))?;

        let points_synchronized = IntCounter::with_opts(Opts::new(
            "nfgw_points_synchronized_total",
            "Catalog points registered by synchronization",
        ))?;
        registry.register(Box::new(points_synchronized.clone()))?;

        let scrape_batches_failed = IntCounter::with_opts(Opts::new(
            "nfgw_scrape_batches_failed_total",
            "Time-series batches dropped from a scrape after a failed query",
        ))?;
        registry.register(Box::new(scrape_batches_failed.clone()))?;

        Ok(Self {
            remote_calls,
            points_synchronized,
            scrape_batches_failed,
        })
    }

    pub fn record_call(&self, operation: &str, outcome: &str) {
        self.remote_calls
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn record_points_synchronized(&self, count: usize) {
        self.points_synchronized.inc_by(count as u64);
    }

    pub fn record_failed_batch(&self) {
        self.scrape_batches_failed.inc();
    }

    pub fn calls(&self, operation: &str, outcome: &str) -> u64 {
        self.remote_calls
            .with_label_values(&[operation, outcome])
            .get()
    }

    pub fn points_synchronized(&self) -> u64 {
        self.points_synchronized.get()
    }

    pub fn failed_batches(&self) -> u64 {
        self.scrape_batches_failed.get()
    }
}

/// Record against optional metrics without cluttering call sites.
pub(crate) trait MetricsExt {
    fn call(&self, operation: &str, outcome: &str);
}

impl MetricsExt for Option<&GatewayMetrics> {
    fn call(&self, operation: &str, outcome: &str) {
        if let Some(metrics) = self {
            metrics.record_call(operation, outcome);
        }
    }
}
