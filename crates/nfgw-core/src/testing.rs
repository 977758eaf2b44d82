//! ---
//! gw_section: "01-core-functionality"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Catalog synchronization and command translation core."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
//! In-memory remote services for tests.
//!
//! The fakes record every request and count sessions so tests can check that
//! each operation releases its session on every path.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nfgw_common::GatewayConfig;
use parking_lot::Mutex;

use crate::descriptor::{CatalogEntry, ObjectId, PointBinding, PropertyReference, ProtocolBinding};
use crate::error::{GatewayError, Result};
use crate::service::{
    AddressingMode, BackendFactory, Backends, CommandService, CommandSession, DataQuery,
    PointPage, PointPageRequest, PointService, PointSession, ReadReply, ReadRequest,
    RemoteError, TimeSeries, WriteReply, WriteRequest,
};
use crate::value::TaggedValue;

/// Catalog entry for an analog-value present-value binding.
///
/// Attributes cover the default name template; `prop_object_name` is
/// `object-{instance}`.
pub fn bacnet_entry(uuid: &str, instance: u32, example_value: TaggedValue) -> CatalogEntry {
    let device = instance / 50;
    CatalogEntry {
        uuid: uuid.to_owned(),
        layer: "hpl:bacnet:1".to_owned(),
        attrs: BTreeMap::from([
            ("device_id".to_owned(), (260_000 + device).to_string()),
            ("device_prop_object_name".to_owned(), format!("device-{device}")),
            ("prop_object_name".to_owned(), format!("object-{instance}")),
            ("prop_units".to_owned(), "degrees-celsius".to_owned()),
        ]),
        period: Some(Duration::from_secs(60)),
        binding: Some(ProtocolBinding::Bacnet(PointBinding {
            device_address: format!("10.0.0.{instance}:47808"),
            property: Some(PropertyReference {
                object_id: ObjectId {
                    object_type: 2,
                    instance,
                },
                property_id: 85,
                array_index: None,
            }),
            example_value: Some(example_value),
        })),
    }
}

#[derive(Debug, Default)]
struct SessionCounter {
    opened: AtomicUsize,
    open: AtomicUsize,
}

impl SessionCounter {
    fn acquire(self: &Arc<Self>) -> SessionGuard {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.open.fetch_add(1, Ordering::SeqCst);
        SessionGuard(self.clone())
    }
}

struct SessionGuard(Arc<SessionCounter>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct PointState {
    entries: Vec<CatalogEntry>,
    totals: Vec<u64>,
    failing_pages: HashSet<usize>,
    series: Vec<TimeSeries>,
    failing_batches: HashSet<usize>,
    page_requests: Vec<PointPageRequest>,
    data_queries: Vec<DataQuery>,
}

/// Catalog and time-series service serving a fixed catalog.
#[derive(Debug, Default)]
pub struct FakePointService {
    state: Arc<Mutex<PointState>>,
    sessions: Arc<SessionCounter>,
    refuse: bool,
}

impl FakePointService {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        let service = Self::default();
        service.state.lock().entries = entries;
        service
    }

    /// Report these totals for the first pages instead of the catalog size.
    pub fn report_totals(self, totals: Vec<u64>) -> Self {
        self.state.lock().totals = totals;
        self
    }

    /// Fail the page fetch with this zero-based call index.
    pub fn fail_page(self, index: usize) -> Self {
        self.state.lock().failing_pages.insert(index);
        self
    }

    pub fn with_series(self, series: impl IntoIterator<Item = TimeSeries>) -> Self {
        self.state.lock().series.extend(series);
        self
    }

    /// Fail the time-series query with this zero-based call index.
    pub fn fail_data_batch(self, index: usize) -> Self {
        self.state.lock().failing_batches.insert(index);
        self
    }

    pub fn refuse_connections(mut self) -> Self {
        self.refuse = true;
        self
    }

    pub fn page_requests(&self) -> Vec<PointPageRequest> {
        self.state.lock().page_requests.clone()
    }

    pub fn data_queries(&self) -> Vec<DataQuery> {
        self.state.lock().data_queries.clone()
    }

    pub fn sessions_opened(&self) -> usize {
        self.sessions.opened.load(Ordering::SeqCst)
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.open.load(Ordering::SeqCst)
    }
}

struct FakePointSession {
    state: Arc<Mutex<PointState>>,
    _guard: SessionGuard,
}

#[async_trait]
impl PointService for FakePointService {
    async fn connect(&self) -> Result<Box<dyn PointSession>> {
        if self.refuse {
            return Err(GatewayError::Transport("connection refused".into()));
        }
        Ok(Box::new(FakePointSession {
            state: self.state.clone(),
            _guard: self.sessions.acquire(),
        }))
    }
}

#[async_trait]
impl PointSession for FakePointSession {
    async fn get_points(&mut self, request: PointPageRequest) -> Result<PointPage> {
        let mut state = self.state.lock();
        let index = state.page_requests.len();
        state.page_requests.push(request.clone());
        if state.failing_pages.contains(&index) {
            return Err(GatewayError::Transport(format!(
                "page {index} unavailable"
            )));
        }
        let start = (request.page_offset as usize).min(state.entries.len());
        let end = start
            .saturating_add(request.page_size as usize)
            .min(state.entries.len());
        let total_count = state
            .totals
            .get(index)
            .copied()
            .unwrap_or(state.entries.len() as u64);
        Ok(PointPage {
            points: state.entries[start..end].to_vec(),
            total_count,
        })
    }

    async fn get_data(&mut self, request: DataQuery) -> Result<Vec<TimeSeries>> {
        let mut state = self.state.lock();
        let index = state.data_queries.len();
        state.data_queries.push(request.clone());
        if state.failing_batches.contains(&index) {
            return Err(GatewayError::Transport(format!(
                "time-series batch {index} unavailable"
            )));
        }
        Ok(state
            .series
            .iter()
            .filter(|series| request.uuids.contains(&series.uuid))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
struct CommandState {
    values: HashMap<String, TaggedValue>,
    reads: Vec<ReadRequest>,
    writes: Vec<WriteRequest>,
    write_error: Option<RemoteError>,
    read_error: Option<RemoteError>,
}

/// Command service backed by an in-memory value store.
#[derive(Debug)]
pub struct FakeCommandService {
    mode: AddressingMode,
    state: Arc<Mutex<CommandState>>,
    sessions: Arc<SessionCounter>,
    refuse: bool,
}

impl FakeCommandService {
    pub fn new(mode: AddressingMode) -> Self {
        Self {
            mode,
            state: Arc::default(),
            sessions: Arc::default(),
            refuse: false,
        }
    }

    /// Answer every write with this device error.
    pub fn reject_writes(self, error: RemoteError) -> Self {
        self.state.lock().write_error = Some(error);
        self
    }

    pub fn reject_reads(self, error: RemoteError) -> Self {
        self.state.lock().read_error = Some(error);
        self
    }

    pub fn refuse_connections(mut self) -> Self {
        self.refuse = true;
        self
    }

    pub fn reads(&self) -> Vec<ReadRequest> {
        self.state.lock().reads.clone()
    }

    pub fn writes(&self) -> Vec<WriteRequest> {
        self.state.lock().writes.clone()
    }

    pub fn sessions_opened(&self) -> usize {
        self.sessions.opened.load(Ordering::SeqCst)
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.open.load(Ordering::SeqCst)
    }
}

struct FakeCommandSession {
    state: Arc<Mutex<CommandState>>,
    _guard: SessionGuard,
}

#[async_trait]
impl CommandService for FakeCommandService {
    fn addressing_mode(&self) -> AddressingMode {
        self.mode
    }

    async fn connect(&self) -> Result<Box<dyn CommandSession>> {
        if self.refuse {
            return Err(GatewayError::Transport("connection refused".into()));
        }
        Ok(Box::new(FakeCommandSession {
            state: self.state.clone(),
            _guard: self.sessions.acquire(),
        }))
    }
}

#[async_trait]
impl CommandSession for FakeCommandSession {
    async fn read_property(&mut self, request: ReadRequest) -> Result<ReadReply> {
        let mut state = self.state.lock();
        let key = format!("{:?}", request.addressing);
        state.reads.push(request);
        Ok(ReadReply {
            value: state.values.get(&key).cloned(),
            error: state.read_error.clone(),
        })
    }

    async fn write_property(&mut self, request: WriteRequest) -> Result<WriteReply> {
        let mut state = self.state.lock();
        state.writes.push(request.clone());
        if let Some(error) = state.write_error.clone() {
            return Ok(WriteReply { error: Some(error) });
        }
        state
            .values
            .insert(format!("{:?}", request.addressing), request.value);
        Ok(WriteReply::default())
    }
}

/// Hands out the same fake services for every configuration.
pub struct FakeBackendFactory {
    points: Arc<FakePointService>,
    commands: Arc<FakeCommandService>,
    configs: Mutex<Vec<GatewayConfig>>,
}

impl FakeBackendFactory {
    pub fn new(points: Arc<FakePointService>, commands: Arc<FakeCommandService>) -> Self {
        Self {
            points,
            commands,
            configs: Mutex::new(Vec::new()),
        }
    }

    /// Configurations backends were built for.
    pub fn configs(&self) -> Vec<GatewayConfig> {
        self.configs.lock().clone()
    }
}

impl BackendFactory for FakeBackendFactory {
    fn build(&self, config: &GatewayConfig) -> Result<Backends> {
        self.configs.lock().push(config.clone());
        Ok(Backends {
            points: self.points.clone(),
            commands: self.commands.clone(),
        })
    }
}
