//! ---
//! gw_section: "01-core-functionality"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Shared primitives and utilities for the gateway runtime."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
//! Shared primitives for the point gateway workspace.
//! This crate exposes the configuration surface, tracing initialisation,
//! and time-range helpers consumed across the workspace.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{
    BackendKind, GatewayConfig, LoggingConfig, DEFAULT_TOPIC_NAME_FORMAT, MAX_PRIORITY,
    MIN_PRIORITY,
};
pub use logging::{init_tracing, LogFormat};
pub use time::TimeRange;
