//! ---
//! gw_section: "01-core-functionality"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Catalog synchronization and command translation core."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
//! Request/response contracts of the remote catalog, command, and
//! time-series services.
//!
//! Every operation opens one session with `connect`, issues its calls on it,
//! and drops it before returning. Implementations release their connection
//! when the session is dropped, so early returns release it as well.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nfgw_common::GatewayConfig;

use crate::descriptor::{CatalogEntry, PropertyReference};
use crate::error::Result;
use crate::value::TaggedValue;

/// Catalog filter sent with every page request.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogQuery {
    Text(String),
    Structured(serde_json::Value),
}

impl CatalogQuery {
    /// Structured filter when configured, the text query otherwise.
    pub fn from_config(config: &GatewayConfig) -> Self {
        match &config.structured_query {
            Some(query) => CatalogQuery::Structured(query.clone()),
            None => CatalogQuery::Text(config.query.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointPageRequest {
    pub layer: String,
    pub query: CatalogQuery,
    pub page_size: u32,
    pub page_offset: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointPage {
    pub points: Vec<CatalogEntry>,
    /// Server-reported size of the whole catalog.
    pub total_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationMethod {
    First,
    Last,
    Avg,
    Min,
    Max,
}

impl AggregationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMethod::First => "FIRST",
            AggregationMethod::Last => "LAST",
            AggregationMethod::Avg => "AVG",
            AggregationMethod::Min => "MIN",
            AggregationMethod::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataQuery {
    pub layer: String,
    pub uuids: Vec<String>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub window: Duration,
    pub method: AggregationMethod,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub uuid: String,
    pub values: Vec<Sample>,
}

/// How read and write commands address a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    DeviceProperty,
    PointUuid,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Addressing {
    DeviceProperty {
        device_address: String,
        property: PropertyReference,
    },
    PointUuid {
        uuid: String,
        layer: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    pub addressing: Addressing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadReply {
    /// `None` when the reply carried a value with no variant populated.
    pub value: Option<TaggedValue>,
    pub error: Option<RemoteError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub addressing: Addressing,
    pub value: TaggedValue,
    pub priority: u8,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteReply {
    pub error: Option<RemoteError>,
}

/// Device-level failure carried inside an otherwise successful reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    ClassCode { class: u32, code: u32 },
    Reject(String),
    Abort(String),
    Message(String),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::ClassCode { class, code } => {
                write!(f, "device error class {class} code {code}")
            }
            RemoteError::Reject(reason) => write!(f, "request rejected: {reason}"),
            RemoteError::Abort(reason) => write!(f, "request aborted: {reason}"),
            RemoteError::Message(message) => f.write_str(message),
        }
    }
}

/// Catalog listing and time-series queries.
#[async_trait]
pub trait PointService: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn PointSession>>;
}

#[async_trait]
pub trait PointSession: Send {
    async fn get_points(&mut self, request: PointPageRequest) -> Result<PointPage>;

    async fn get_data(&mut self, request: DataQuery) -> Result<Vec<TimeSeries>>;
}

/// Device property reads and writes.
#[async_trait]
pub trait CommandService: Send + Sync {
    fn addressing_mode(&self) -> AddressingMode;

    async fn connect(&self) -> Result<Box<dyn CommandSession>>;
}

#[async_trait]
pub trait CommandSession: Send {
    async fn read_property(&mut self, request: ReadRequest) -> Result<ReadReply>;

    async fn write_property(&mut self, request: WriteRequest) -> Result<WriteReply>;
}

/// Service handles for one configuration.
#[derive(Clone)]
pub struct Backends {
    pub points: Arc<dyn PointService>,
    pub commands: Arc<dyn CommandService>,
}

/// Builds service handles from the gateway configuration.
pub trait BackendFactory: Send + Sync {
    fn build(&self, config: &GatewayConfig) -> Result<Backends>;
}
