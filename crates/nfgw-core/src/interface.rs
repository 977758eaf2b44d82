//! ---
//! gw_section: "01-core-functionality"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Catalog synchronization and command translation core."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
//! Host-facing point interface.
//!
//! A [`GatewayInterface`] is inert until [`PointInterface::configure`] has
//! built its backends and synchronized the catalog into the host registry.
//! Mutating operations take `&mut self`; the host serializes calls.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use nfgw_common::GatewayConfig;
use nfgw_logging::{gw_info, LogContext};
use serde_json::Value;

use crate::catalog::{CatalogSynchronizer, SyncReport};
use crate::command::CommandTranslator;
use crate::descriptor::Register;
use crate::error::{GatewayError, Result};
use crate::metrics::GatewayMetrics;
use crate::naming::NameFormatter;
use crate::registry::RegisterProvider;
use crate::scrape::ScrapeAggregator;
use crate::service::{BackendFactory, Backends, CatalogQuery};
use crate::tracker::{PointReverter, RevertReport, WriteTracker};

/// Operations a host platform drives on a configured gateway.
#[async_trait]
pub trait PointInterface: Send + Sync {
    /// Build backends from `config` and synchronize the catalog.
    ///
    /// Entry and page failures are carried in the report; only an invalid
    /// configuration or backend construction failure is an error.
    async fn configure(&mut self, config: GatewayConfig) -> Result<SyncReport>;

    async fn get_point(&self, name: &str) -> Result<Value>;

    /// Write a value. `priority` defaults to the configured priority.
    async fn set_point(&mut self, name: &str, value: Value, priority: Option<u8>) -> Result<()>;

    /// Release an override. Without `priority` every priority the point was
    /// written at is released, or the configured priority when none is held.
    /// Stops at the first failure; unreleased priorities stay tracked.
    async fn revert_point(&mut self, name: &str, priority: Option<u8>) -> Result<()>;

    async fn revert_all(&mut self, priority: Option<u8>) -> RevertReport;

    /// Most recent sample of every synchronized point over the scrape window.
    async fn scrape_all(&self) -> Result<IndexMap<String, f64>>;
}

struct Configured {
    config: GatewayConfig,
    backends: Backends,
    translator: CommandTranslator,
    aggregator: ScrapeAggregator,
    /// uuid to display name, in catalog order.
    points: IndexMap<String, String>,
}

pub struct GatewayInterface<R: RegisterProvider> {
    registry: R,
    factory: Arc<dyn BackendFactory>,
    state: Option<Configured>,
    tracker: WriteTracker,
    metrics: Option<GatewayMetrics>,
}

impl<R: RegisterProvider> GatewayInterface<R> {
    pub fn new(registry: R, factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            registry,
            factory,
            state: None,
            tracker: WriteTracker::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: GatewayMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn into_registry(self) -> R {
        self.registry
    }

    pub fn is_configured(&self) -> bool {
        self.state.is_some()
    }

    pub fn config(&self) -> Option<&GatewayConfig> {
        self.state.as_ref().map(|state| &state.config)
    }

    /// Synchronized points, uuid to display name.
    pub fn catalog(&self) -> Option<&IndexMap<String, String>> {
        self.state.as_ref().map(|state| &state.points)
    }

    /// Names holding an outstanding override, in write order.
    pub fn written_points(&self) -> Vec<String> {
        self.tracker.names().map(str::to_owned).collect()
    }

    pub fn tracker(&self) -> &WriteTracker {
        &self.tracker
    }

    fn configured(&self) -> Result<&Configured> {
        self.state
            .as_ref()
            .ok_or_else(|| GatewayError::Configuration("interface is not configured".into()))
    }

    fn lookup(&self, name: &str) -> Result<Arc<Register>> {
        self.registry
            .register_by_name(name)
            .ok_or_else(|| GatewayError::NotFound(format!("no point named '{name}'")))
    }
}

/// Reverts tracked points through the configured command backend.
struct TrackedReverter<'a, R: RegisterProvider> {
    registry: &'a R,
    state: &'a Configured,
    metrics: Option<&'a GatewayMetrics>,
}

#[async_trait]
impl<R: RegisterProvider> PointReverter for TrackedReverter<'_, R> {
    async fn revert_point(&self, name: &str, priority: u8) -> Result<()> {
        let register = self
            .registry
            .register_by_name(name)
            .ok_or_else(|| GatewayError::NotFound(format!("no point named '{name}'")))?;
        self.state
            .translator
            .revert(
                self.state.backends.commands.as_ref(),
                &register,
                Some(priority),
                self.metrics,
            )
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl<R: RegisterProvider> PointInterface for GatewayInterface<R> {
    async fn configure(&mut self, config: GatewayConfig) -> Result<SyncReport> {
        config
            .validate()
            .map_err(|err| GatewayError::Configuration(format!("{err:#}")))?;
        let backends = self.factory.build(&config)?;

        self.state = None;
        self.tracker.clear();

        let synchronizer = CatalogSynchronizer::new(
            config.layer.clone(),
            CatalogQuery::from_config(&config),
            NameFormatter::new(config.topic_name_format.clone()),
        );
        let report = synchronizer
            .synchronize(
                backends.points.as_ref(),
                &mut self.registry,
                config.page_size,
                self.metrics.as_ref(),
            )
            .await;

        gw_info!(
            context = LogContext::operation("configure").with_layer(&config.layer),
            "{} points available for read/write",
            report.count()
        );
        self.state = Some(Configured {
            translator: CommandTranslator::new(config.layer.clone(), config.priority),
            aggregator: ScrapeAggregator::new(config.layer.clone(), config.scrape_window),
            points: report.points.clone(),
            backends,
            config,
        });
        Ok(report)
    }

    async fn get_point(&self, name: &str) -> Result<Value> {
        let state = self.configured()?;
        let register = self.lookup(name)?;
        state
            .translator
            .read(
                state.backends.commands.as_ref(),
                &register,
                self.metrics.as_ref(),
            )
            .await
    }

    async fn set_point(&mut self, name: &str, value: Value, priority: Option<u8>) -> Result<()> {
        let state = self.configured()?;
        let register = self.lookup(name)?;
        let applied = state
            .translator
            .write(
                state.backends.commands.as_ref(),
                &register,
                &value,
                priority,
                self.metrics.as_ref(),
            )
            .await?;
        if value.is_null() {
            self.tracker.release(name, applied);
        } else {
            self.tracker.track(name, applied);
        }
        Ok(())
    }

    async fn revert_point(&mut self, name: &str, priority: Option<u8>) -> Result<()> {
        self.configured()?;
        let register = self.lookup(name)?;
        let levels: Vec<Option<u8>> = match priority {
            Some(priority) => vec![Some(priority)],
            None => {
                let held = self.tracker.priorities_of(name);
                if held.is_empty() {
                    vec![None]
                } else {
                    held.into_iter().map(Some).collect()
                }
            }
        };
        for level in levels {
            let state = self.configured()?;
            let applied = state
                .translator
                .revert(
                    state.backends.commands.as_ref(),
                    &register,
                    level,
                    self.metrics.as_ref(),
                )
                .await?;
            self.tracker.release(name, applied);
        }
        Ok(())
    }

    async fn revert_all(&mut self, priority: Option<u8>) -> RevertReport {
        let Some(state) = self.state.as_ref() else {
            return RevertReport::default();
        };
        let reverter = TrackedReverter {
            registry: &self.registry,
            state,
            metrics: self.metrics.as_ref(),
        };
        self.tracker.revert_all(&reverter, priority).await
    }

    async fn scrape_all(&self) -> Result<IndexMap<String, f64>> {
        let state = self.configured()?;
        let report = state
            .aggregator
            .scrape(
                state.backends.points.as_ref(),
                &state.points,
                self.metrics.as_ref(),
            )
            .await?;
        Ok(report.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;
    use crate::service::{Addressing, AddressingMode, RemoteError};
    use crate::testing::{bacnet_entry, FakeBackendFactory, FakeCommandService, FakePointService};
    use crate::value::TaggedValue;
    use serde_json::json;

    struct Harness {
        points: Arc<FakePointService>,
        commands: Arc<FakeCommandService>,
        factory: Arc<FakeBackendFactory>,
        interface: GatewayInterface<MemoryRegistry>,
    }

    fn harness(points: FakePointService, commands: FakeCommandService) -> Harness {
        let points = Arc::new(points);
        let commands = Arc::new(commands);
        let factory = Arc::new(FakeBackendFactory::new(points.clone(), commands.clone()));
        Harness {
            points,
            commands,
            factory: factory.clone(),
            interface: GatewayInterface::new(MemoryRegistry::new(), factory),
        }
    }

    fn config() -> GatewayConfig {
        GatewayConfig {
            topic_name_format: "{prop_object_name}".into(),
            ..GatewayConfig::default()
        }
    }

    fn catalog() -> Vec<crate::descriptor::CatalogEntry> {
        vec![
            bacnet_entry("uuid-0000", 0, TaggedValue::Double(0.0)),
            bacnet_entry("uuid-0001", 1, TaggedValue::Bool(false)),
        ]
    }

    #[tokio::test]
    async fn operations_require_configuration() {
        let h = harness(
            FakePointService::new(catalog()),
            FakeCommandService::new(AddressingMode::DeviceProperty),
        );
        let err = h.interface.get_point("object-0").await.unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));
        assert!(h.interface.scrape_all().await.is_err());
    }

    #[tokio::test]
    async fn invalid_configuration_is_rejected_before_any_call() {
        let mut h = harness(
            FakePointService::new(catalog()),
            FakeCommandService::new(AddressingMode::DeviceProperty),
        );
        let err = h
            .interface
            .configure(GatewayConfig {
                priority: 0,
                ..config()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));
        assert_eq!(h.points.sessions_opened(), 0);
        assert!(!h.interface.is_configured());
    }

    #[tokio::test]
    async fn write_tracks_and_revert_untracks() {
        let mut h = harness(
            FakePointService::new(catalog()),
            FakeCommandService::new(AddressingMode::DeviceProperty),
        );
        let report = h.interface.configure(config()).await.unwrap();
        assert_eq!(report.count(), 2);
        assert_eq!(h.interface.registry().len(), 2);

        h.interface
            .set_point("object-0", json!(21.5), Some(8))
            .await
            .unwrap();
        assert_eq!(h.interface.get_point("object-0").await.unwrap(), json!(21.5));
        assert_eq!(h.interface.written_points(), vec!["object-0".to_owned()]);

        h.interface.revert_point("object-0", None).await.unwrap();
        assert!(h.interface.written_points().is_empty());
        let writes = h.commands.writes();
        assert_eq!(writes.last().unwrap().value, TaggedValue::Null);
        assert_eq!(writes.last().unwrap().priority, 8);
    }

    #[tokio::test]
    async fn unknown_name_is_not_found_without_network() {
        let mut h = harness(
            FakePointService::new(catalog()),
            FakeCommandService::new(AddressingMode::DeviceProperty),
        );
        h.interface.configure(config()).await.unwrap();

        let err = h.interface.get_point("nope").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
        let err = h
            .interface
            .set_point("nope", json!(1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
        assert_eq!(h.commands.sessions_opened(), 0);
    }

    #[tokio::test]
    async fn rejected_write_is_not_tracked() {
        let mut h = harness(
            FakePointService::new(catalog()),
            FakeCommandService::new(AddressingMode::DeviceProperty)
                .reject_writes(RemoteError::Reject("write access denied".into())),
        );
        h.interface.configure(config()).await.unwrap();

        let err = h
            .interface
            .set_point("object-1", json!(true), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::RemoteOperation(_)));
        assert!(h.interface.written_points().is_empty());
    }

    #[tokio::test]
    async fn device_error_on_read_is_a_remote_error() {
        let mut h = harness(
            FakePointService::new(catalog()),
            FakeCommandService::new(AddressingMode::DeviceProperty)
                .reject_reads(RemoteError::ClassCode { class: 2, code: 31 }),
        );
        h.interface.configure(config()).await.unwrap();

        let err = h.interface.get_point("object-0").await.unwrap_err();

        match err {
            GatewayError::RemoteOperation(message) => {
                assert!(message.contains("class 2 code 31"), "{message}")
            }
            other => panic!("unexpected error {other:?}"),
        }
        let reads = h.commands.reads();
        assert_eq!(reads.len(), 1);
        assert!(matches!(
            reads[0].addressing,
            Addressing::DeviceProperty { .. }
        ));
        assert_eq!(h.commands.open_sessions(), 0);
    }

    #[tokio::test]
    async fn configure_builds_backends_for_the_given_config() {
        let mut h = harness(
            FakePointService::new(catalog()),
            FakeCommandService::new(AddressingMode::DeviceProperty),
        );
        h.interface
            .configure(GatewayConfig {
                priority: 9,
                ..config()
            })
            .await
            .unwrap();
        h.interface.configure(config()).await.unwrap();

        let priorities: Vec<u8> = h.factory.configs().iter().map(|c| c.priority).collect();
        assert_eq!(priorities, vec![9, 14]);
        assert_eq!(h.factory.configs()[0].topic_name_format, "{prop_object_name}");
    }

    #[tokio::test]
    async fn revert_all_drains_tracker() {
        let mut h = harness(
            FakePointService::new(catalog()),
            FakeCommandService::new(AddressingMode::DeviceProperty),
        );
        h.interface.configure(config()).await.unwrap();
        h.interface
            .set_point("object-0", json!(19), None)
            .await
            .unwrap();
        h.interface
            .set_point("object-1", json!(true), Some(9))
            .await
            .unwrap();

        let report = h.interface.revert_all(None).await;

        assert!(report.is_complete());
        assert_eq!(report.reverted.len(), 2);
        assert!(h.interface.tracker().is_empty());
        let priorities: Vec<u8> = h.commands.writes()[2..].iter().map(|w| w.priority).collect();
        assert_eq!(priorities, vec![14, 9]);
    }

    #[tokio::test]
    async fn overrides_at_several_priorities_are_all_released() {
        let mut h = harness(
            FakePointService::new(catalog()),
            FakeCommandService::new(AddressingMode::DeviceProperty),
        );
        h.interface.configure(config()).await.unwrap();
        h.interface
            .set_point("object-0", json!(1.0), Some(8))
            .await
            .unwrap();
        h.interface
            .set_point("object-0", json!(2.0), Some(14))
            .await
            .unwrap();
        assert_eq!(h.interface.tracker().priorities_of("object-0"), vec![8, 14]);

        let report = h.interface.revert_all(None).await;

        assert!(report.is_complete());
        assert!(h.interface.tracker().is_empty());
        let released: Vec<u8> = h
            .commands
            .writes()
            .iter()
            .filter(|write| write.value.is_null())
            .map(|write| write.priority)
            .collect();
        assert_eq!(released, vec![8, 14]);
    }

    #[tokio::test]
    async fn releasing_one_priority_keeps_the_other_tracked() {
        let mut h = harness(
            FakePointService::new(catalog()),
            FakeCommandService::new(AddressingMode::DeviceProperty),
        );
        h.interface.configure(config()).await.unwrap();
        h.interface
            .set_point("object-0", json!(1.0), Some(8))
            .await
            .unwrap();
        h.interface
            .set_point("object-0", json!(2.0), Some(14))
            .await
            .unwrap();

        h.interface
            .set_point("object-0", Value::Null, Some(14))
            .await
            .unwrap();
        assert_eq!(h.interface.tracker().priorities_of("object-0"), vec![8]);

        h.interface.revert_point("object-0", Some(8)).await.unwrap();
        assert!(h.interface.written_points().is_empty());
    }

    #[tokio::test]
    async fn revert_without_priority_releases_every_held_level() {
        let mut h = harness(
            FakePointService::new(catalog()),
            FakeCommandService::new(AddressingMode::DeviceProperty),
        );
        h.interface.configure(config()).await.unwrap();
        h.interface
            .set_point("object-0", json!(1.0), Some(3))
            .await
            .unwrap();
        h.interface
            .set_point("object-0", json!(2.0), Some(9))
            .await
            .unwrap();

        h.interface.revert_point("object-0", None).await.unwrap();

        assert!(h.interface.written_points().is_empty());
        let last_two: Vec<(TaggedValue, u8)> = h.commands.writes()[2..]
            .iter()
            .map(|write| (write.value.clone(), write.priority))
            .collect();
        assert_eq!(
            last_two,
            vec![(TaggedValue::Null, 3), (TaggedValue::Null, 9)]
        );
    }

    #[tokio::test]
    async fn reconfigure_clears_written_set() {
        let mut h = harness(
            FakePointService::new(catalog()),
            FakeCommandService::new(AddressingMode::DeviceProperty),
        );
        h.interface.configure(config()).await.unwrap();
        h.interface
            .set_point("object-0", json!(1.0), None)
            .await
            .unwrap();

        let report = h.interface.configure(config()).await.unwrap();

        assert!(h.interface.written_points().is_empty());
        assert!(report.is_complete(), "{:?}", report.errors);
        assert_eq!(h.interface.catalog().map(IndexMap::len), Some(2));
        assert_eq!(h.interface.registry().len(), 2);
    }

    #[tokio::test]
    async fn scrape_all_maps_uuids_to_names() {
        let points = FakePointService::new(catalog()).with_series([crate::service::TimeSeries {
            uuid: "uuid-0001".into(),
            values: vec![crate::service::Sample {
                timestamp: chrono::Utc::now(),
                value: 1.0,
            }],
        }]);
        let mut h = harness(points, FakeCommandService::new(AddressingMode::DeviceProperty));
        h.interface.configure(config()).await.unwrap();

        let values = h.interface.scrape_all().await.unwrap();

        assert_eq!(values.len(), 1);
        assert_eq!(values["object-1"], 1.0);
    }
}
