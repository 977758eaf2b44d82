//! ---
//! gw_section: "01-core-functionality"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Catalog synchronization and command translation core."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
//! Paged catalog ingestion.
//!
//! The server's reported total is re-read on every page and alone decides
//! when paging stops. A failed page ends synchronization; registers inserted
//! from earlier pages stay in place. A register already held by the host for
//! the same uuid and name is adopted rather than inserted again.

use std::collections::HashSet;

use indexmap::IndexMap;
use nfgw_logging::{
    gw_debug, gw_error, gw_info, gw_warn, log_operation_event, LogContext, OperationOutcome,
};

use crate::descriptor::{PointDescriptor, Register};
use crate::error::GatewayError;
use crate::metrics::{GatewayMetrics, MetricsExt};
use crate::naming::NameFormatter;
use crate::registry::RegisterProvider;
use crate::service::{CatalogQuery, PointPageRequest, PointService};

const OPERATION: &str = "synchronize";

/// Outcome of one synchronization pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SyncReport {
    /// Registered points in catalog order, uuid to display name.
    pub points: IndexMap<String, String>,
    /// Pages fetched successfully.
    pub pages: usize,
    /// Entry-level problems plus, last, the error that ended paging early.
    pub errors: Vec<GatewayError>,
}

impl SyncReport {
    pub fn count(&self) -> usize {
        self.points.len()
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct CatalogSynchronizer {
    layer: String,
    query: CatalogQuery,
    formatter: NameFormatter,
}

impl CatalogSynchronizer {
    pub fn new(layer: impl Into<String>, query: CatalogQuery, formatter: NameFormatter) -> Self {
        Self {
            layer: layer.into(),
            query,
            formatter,
        }
    }

    /// Page through the catalog and insert one register per decodable entry.
    pub async fn synchronize(
        &self,
        service: &dyn PointService,
        registry: &mut dyn RegisterProvider,
        page_size: u32,
        metrics: Option<&GatewayMetrics>,
    ) -> SyncReport {
        let ctx = LogContext::operation(OPERATION).with_layer(&self.layer);
        let mut report = SyncReport::default();

        let mut session = match service.connect().await {
            Ok(session) => session,
            Err(err) => {
                gw_error!(context = ctx, error = err, "unable to open catalog session");
                metrics.call(OPERATION, "fault");
                report.errors.push(err);
                log_operation_event(&ctx, "catalog unavailable", OperationOutcome::Fault);
                return report;
            }
        };

        let mut seen: HashSet<String> = HashSet::new();
        let (mut offset, mut total): (u64, u64) = (0, 1);
        while offset < total {
            let page_offset = match u32::try_from(offset) {
                Ok(page_offset) => page_offset,
                Err(_) => {
                    report.errors.push(GatewayError::Consistency(format!(
                        "page offset {offset} exceeds the addressable range"
                    )));
                    break;
                }
            };
            let request = PointPageRequest {
                layer: self.layer.clone(),
                query: self.query.clone(),
                page_size,
                page_offset,
            };
            let page = match session.get_points(request).await {
                Ok(page) => page,
                Err(err) => {
                    gw_error!(
                        context = ctx,
                        error = err,
                        "error loading points at offset {}",
                        offset
                    );
                    metrics.call(OPERATION, "fault");
                    report.errors.push(err);
                    break;
                }
            };
            metrics.call(OPERATION, "success");
            report.pages += 1;

            let fetched = page.points.len() as u64;
            total = page.total_count;
            gw_info!(
                context = ctx,
                "got points batch {}; total is {}",
                fetched,
                total
            );
            if fetched == 0 && offset < total {
                let err = GatewayError::Consistency(format!(
                    "empty page at offset {offset} while the catalog reports {total} points"
                ));
                gw_error!(context = ctx, error = err, "aborting synchronization");
                report.errors.push(err);
                break;
            }
            offset += fetched;

            for entry in page.points {
                self.ingest(entry, registry, &mut seen, &mut report);
            }
        }
        drop(session);

        if let Some(metrics) = metrics {
            metrics.record_points_synchronized(report.count());
        }
        let outcome = if report.is_complete() {
            OperationOutcome::Success
        } else if report.count() > 0 {
            OperationOutcome::Partial
        } else {
            OperationOutcome::Fault
        };
        log_operation_event(
            &ctx,
            &format!(
                "registered {} points from {} pages with {} errors",
                report.count(),
                report.pages,
                report.errors.len()
            ),
            outcome,
        );
        report
    }

    fn ingest(
        &self,
        entry: crate::descriptor::CatalogEntry,
        registry: &mut dyn RegisterProvider,
        seen: &mut HashSet<String>,
        report: &mut SyncReport,
    ) {
        let uuid = entry.uuid.clone();
        let ctx = LogContext::operation(OPERATION)
            .with_layer(&self.layer)
            .with_point(&uuid);
        if seen.contains(&uuid) {
            let err = GatewayError::Consistency(format!("uuid {uuid} listed more than once"));
            gw_warn!(context = ctx, error = err, "skipping duplicate catalog entry");
            report.errors.push(err);
            return;
        }
        let descriptor = match PointDescriptor::from_entry(entry) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                gw_warn!(context = ctx, error = err, "skipping undecodable catalog entry");
                report.errors.push(err);
                return;
            }
        };
        let name = match self.formatter.format(&descriptor.name_attributes()) {
            Ok(name) => name,
            Err(err) => {
                gw_error!(context = ctx, error = err, "no display name for catalog entry");
                report.errors.push(err);
                return;
            }
        };
        if let Some(existing) = registry.register_by_name(&name) {
            if existing.descriptor().uuid == uuid {
                gw_debug!(context = ctx, "already registered as {}", name);
                seen.insert(uuid.clone());
                report.points.insert(uuid, name);
                return;
            }
        }
        if let Err(err) = registry.insert_register(Register::new(name.clone(), descriptor)) {
            gw_warn!(context = ctx, error = err, "host rejected register");
            report.errors.push(err);
            return;
        }
        gw_debug!(context = ctx, "registered as {}", name);
        seen.insert(uuid.clone());
        report.points.insert(uuid, name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;
    use crate::testing::{bacnet_entry, FakePointService};
    use crate::value::TaggedValue;

    fn synchronizer() -> CatalogSynchronizer {
        CatalogSynchronizer::new(
            "hpl:bacnet:1",
            CatalogQuery::Text("@period:[1, +inf]".into()),
            NameFormatter::default(),
        )
    }

    fn catalog(n: usize) -> Vec<crate::descriptor::CatalogEntry> {
        (0..n)
            .map(|i| bacnet_entry(&format!("uuid-{i:04}"), i as u32, TaggedValue::Real(0.0)))
            .collect()
    }

    #[tokio::test]
    async fn pages_until_reported_total() {
        let service = FakePointService::new(catalog(250));
        let mut registry = MemoryRegistry::new();

        let report = synchronizer()
            .synchronize(&service, &mut registry, 100, None)
            .await;

        assert!(report.is_complete(), "{:?}", report.errors);
        assert_eq!(report.count(), 250);
        assert_eq!(report.pages, 3);
        assert_eq!(registry.len(), 250);
        let offsets: Vec<u32> = service
            .page_requests()
            .iter()
            .map(|r| r.page_offset)
            .collect();
        assert_eq!(offsets, vec![0, 100, 200]);
        assert_eq!(service.open_sessions(), 0);
        assert_eq!(service.sessions_opened(), 1);
    }

    #[tokio::test]
    async fn empty_catalog_fetches_one_page() {
        let service = FakePointService::new(Vec::new());
        let mut registry = MemoryRegistry::new();
        let report = synchronizer()
            .synchronize(&service, &mut registry, 100, None)
            .await;
        assert!(report.is_complete());
        assert_eq!(report.pages, 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn page_failure_keeps_earlier_registers_and_releases_session() {
        let service = FakePointService::new(catalog(250)).fail_page(1);
        let mut registry = MemoryRegistry::new();

        let report = synchronizer()
            .synchronize(&service, &mut registry, 100, None)
            .await;

        assert_eq!(report.count(), 100);
        assert_eq!(registry.len(), 100);
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0], GatewayError::Transport(_)));
        assert_eq!(service.open_sessions(), 0);
    }

    #[tokio::test]
    async fn empty_page_below_total_is_a_consistency_error() {
        let service = FakePointService::new(catalog(10)).report_totals(vec![50, 50]);
        let mut registry = MemoryRegistry::new();

        let report = synchronizer()
            .synchronize(&service, &mut registry, 10, None)
            .await;

        assert_eq!(report.count(), 10);
        assert_eq!(report.pages, 2);
        assert!(matches!(
            report.errors.last(),
            Some(GatewayError::Consistency(_))
        ));
    }

    #[tokio::test]
    async fn shrinking_total_stops_paging_early() {
        let service = FakePointService::new(catalog(300)).report_totals(vec![300, 150]);
        let mut registry = MemoryRegistry::new();
        let report = synchronizer()
            .synchronize(&service, &mut registry, 100, None)
            .await;
        assert!(report.is_complete());
        assert_eq!(report.pages, 2);
        assert_eq!(report.count(), 200);
    }

    #[tokio::test]
    async fn duplicates_and_undecodable_entries_are_skipped() {
        let mut entries = catalog(3);
        entries.push(bacnet_entry("uuid-0001", 1, TaggedValue::Real(0.0)));
        let mut broken = bacnet_entry("uuid-broken", 9, TaggedValue::Null);
        broken.binding = None;
        entries.push(broken);
        let service = FakePointService::new(entries);
        let mut registry = MemoryRegistry::new();

        let report = synchronizer()
            .synchronize(&service, &mut registry, 100, None)
            .await;

        assert_eq!(report.count(), 3);
        assert_eq!(report.errors.len(), 2);
        assert!(matches!(report.errors[0], GatewayError::Consistency(_)));
        assert!(matches!(report.errors[1], GatewayError::Decode(_)));
        let unique: HashSet<&String> = report.points.values().collect();
        assert_eq!(unique.len(), 3);
    }

    #[tokio::test]
    async fn connect_failure_is_reported() {
        let service = FakePointService::new(catalog(5)).refuse_connections();
        let mut registry = MemoryRegistry::new();
        let report = synchronizer()
            .synchronize(&service, &mut registry, 100, None)
            .await;
        assert_eq!(report.count(), 0);
        assert_eq!(report.pages, 0);
        assert!(matches!(report.errors[0], GatewayError::Transport(_)));
    }

    #[tokio::test]
    async fn offsets_strictly_increase_for_any_page_size() {
        for page_size in [1u32, 7, 33, 100, 1000] {
            let service = FakePointService::new(catalog(64));
            let mut registry = MemoryRegistry::new();
            let report = synchronizer()
                .synchronize(&service, &mut registry, page_size, None)
                .await;
            assert_eq!(report.count(), 64);
            let offsets: Vec<u32> = service
                .page_requests()
                .iter()
                .map(|r| r.page_offset)
                .collect();
            assert!(offsets.windows(2).all(|w| w[0] < w[1]), "{page_size}");
            assert!(offsets.iter().all(|o| *o < 64));
        }
    }
}
