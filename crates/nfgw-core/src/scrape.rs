//! ---
//! gw_section: "01-core-functionality"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Catalog synchronization and command translation core."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
//! Batched, windowed time-series reads.
//!
//! A failed batch is logged and its points are left out of the result; the
//! remaining batches still run.

use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use nfgw_common::TimeRange;
use nfgw_logging::{gw_debug, gw_warn, log_operation_event, LogContext, OperationOutcome};

use crate::error::Result;
use crate::metrics::{GatewayMetrics, MetricsExt};
use crate::service::{AggregationMethod, DataQuery, PointService};

/// Largest number of uuids sent in one time-series query.
pub const MAX_BATCH_SIZE: usize = 100;

const OPERATION: &str = "scrape";

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScrapeReport {
    /// Most recent sample per display name.
    pub values: IndexMap<String, f64>,
    pub batches: usize,
    pub failed_batches: usize,
}

impl ScrapeReport {
    pub fn is_complete(&self) -> bool {
        self.failed_batches == 0
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeAggregator {
    layer: String,
    window: Duration,
    batch_size: usize,
}

impl ScrapeAggregator {
    pub fn new(layer: impl Into<String>, window: Duration) -> Self {
        Self {
            layer: layer.into(),
            window,
            batch_size: MAX_BATCH_SIZE,
        }
    }

    /// Use smaller batches; sizes outside `1..=100` are clamped.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Scrape the trailing window ending now.
    pub async fn scrape(
        &self,
        service: &dyn PointService,
        points: &IndexMap<String, String>,
        metrics: Option<&GatewayMetrics>,
    ) -> Result<ScrapeReport> {
        self.scrape_at(service, points, Utc::now(), metrics).await
    }

    /// Scrape the window ending at `now`. `points` maps uuid to display name.
    ///
    /// Only a failure to open the session is returned as an error.
    pub async fn scrape_at(
        &self,
        service: &dyn PointService,
        points: &IndexMap<String, String>,
        now: DateTime<Utc>,
        metrics: Option<&GatewayMetrics>,
    ) -> Result<ScrapeReport> {
        let ctx = LogContext::operation(OPERATION).with_layer(&self.layer);
        let mut report = ScrapeReport::default();
        if points.is_empty() {
            log_operation_event(&ctx, "returning 0 readings", OperationOutcome::Success);
            return Ok(report);
        }

        let range = TimeRange::trailing(now, self.window);
        let uuids: Vec<&String> = points.keys().collect();
        let mut session = service.connect().await?;

        for (index, batch) in uuids.chunks(self.batch_size).enumerate() {
            let offset = index * self.batch_size;
            gw_debug!(context = ctx, "{} / {}", offset, uuids.len());
            report.batches += 1;
            let query = DataQuery {
                layer: self.layer.clone(),
                uuids: batch.iter().map(|uuid| (*uuid).clone()).collect(),
                from: range.from,
                to: range.to,
                window: self.window,
                method: AggregationMethod::Last,
            };
            let series = match session.get_data(query).await {
                Ok(series) => series,
                Err(err) => {
                    gw_warn!(
                        context = ctx,
                        error = err,
                        "skipping batch at offset {} of {} points",
                        offset,
                        batch.len()
                    );
                    metrics.call(OPERATION, "fault");
                    if let Some(metrics) = metrics {
                        metrics.record_failed_batch();
                    }
                    report.failed_batches += 1;
                    continue;
                }
            };
            metrics.call(OPERATION, "success");

            for mut series in series {
                if !batch.iter().any(|uuid| **uuid == series.uuid) {
                    continue;
                }
                let Some(name) = points.get(&series.uuid) else {
                    continue;
                };
                series.values.sort_by_key(|sample| sample.timestamp);
                if let Some(last) = series.values.last() {
                    report.values.insert(name.clone(), last.value);
                }
            }
        }
        drop(session);

        let outcome = if report.is_complete() {
            OperationOutcome::Success
        } else {
            OperationOutcome::Partial
        };
        log_operation_event(
            &ctx,
            &format!("returning {} readings", report.values.len()),
            outcome,
        );
        Ok(report)
    }
}
