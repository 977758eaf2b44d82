//! ---
//! gw_section: "05-networking-external-interfaces"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Remote catalog and command service clients."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
//! Network backends for the gateway core: structured RPC clients and a
//! JSON-over-HTTP alternative, selected per configuration.

pub mod convert;
pub mod factory;
pub mod grpc;
pub mod rest;

pub use factory::NetBackendFactory;
pub use grpc::{GrpcCommandService, GrpcPointService};
pub use rest::{RestCommandService, RestPointService};
