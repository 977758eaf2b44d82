//! ---
//! gw_section: "01-core-functionality"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Catalog synchronization and command translation core."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
//! Catalog synchronization, value codec, command translation, write tracking,
//! and scrape aggregation for the point gateway.

pub mod catalog;
pub mod codec;
pub mod command;
pub mod descriptor;
pub mod error;
pub mod interface;
pub mod metrics;
pub mod naming;
pub mod registry;
pub mod scrape;
pub mod service;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tracker;
pub mod value;

pub use catalog::{CatalogSynchronizer, SyncReport};
pub use codec::ValueCodec;
pub use command::CommandTranslator;
pub use descriptor::{
    CatalogEntry, ObjectId, PointBinding, PointDescriptor, PropertyReference, ProtocolBinding,
    Register, UNITS_ATTR,
};
pub use error::{GatewayError, Result};
pub use interface::{GatewayInterface, PointInterface};
pub use metrics::GatewayMetrics;
pub use naming::{NameFormatter, TemplateError};
pub use registry::{MemoryRegistry, RegisterProvider};
pub use scrape::{ScrapeAggregator, ScrapeReport, MAX_BATCH_SIZE};
pub use service::{
    Addressing, AddressingMode, AggregationMethod, BackendFactory, Backends, CatalogQuery,
    CommandService, CommandSession, DataQuery, PointPage, PointPageRequest, PointService,
    PointSession, ReadReply, ReadRequest, RemoteError, Sample, TimeSeries, WriteReply,
    WriteRequest,
};
pub use tracker::{PointReverter, RevertReport, WriteTracker};
pub use value::{TaggedValue, VariantTag};
