//! ---
//! gw_section: "03-logging"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Structured operation logging for gateway calls."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
#![warn(missing_docs)]

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

/// Context-aware logging macros (`gw_info!` and friends).
pub mod macros;

#[doc(hidden)]
pub use tracing;

/// Initialize a baseline tracing subscriber suitable for development and tests.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer())
        .try_init();
}

/// Structured context attached to every gateway log record.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogContext<'a> {
    /// Gateway operation (`synchronize`, `read`, `write`, `revert`, `scrape`).
    pub operation: Option<&'a str>,
    /// Display name of the point concerned, when there is one.
    pub point: Option<&'a str>,
    /// Catalog layer the operation targets.
    pub layer: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context scoped to a single gateway operation.
    pub fn operation(operation: &'a str) -> Self {
        Self::new().with_operation(operation)
    }

    /// Attach an operation name.
    pub fn with_operation(mut self, operation: &'a str) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Attach a point display name.
    pub fn with_point(mut self, point: &'a str) -> Self {
        self.point = Some(point);
        self
    }

    /// Attach a catalog layer.
    pub fn with_layer(mut self, layer: &'a str) -> Self {
        self.layer = Some(layer);
        self
    }
}

/// Outcome of a remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation completed with part of its work failed.
    Partial,
    /// The operation failed or was aborted.
    Fault,
}

impl OperationOutcome {
    /// Lowercase label used in log fields and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationOutcome::Success => "success",
            OperationOutcome::Partial => "partial",
            OperationOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized record for the end of an operation.
pub fn log_operation_event(context: &LogContext, message: &str, outcome: OperationOutcome) {
    let operation = context.operation.unwrap_or("");
    let point = context.point.unwrap_or("");
    let layer = context.layer.unwrap_or("");
    match outcome {
        OperationOutcome::Success => tracing::info!(
            operation,
            point,
            layer,
            outcome = outcome.as_str(),
            message = %message
        ),
        OperationOutcome::Partial => tracing::warn!(
            operation,
            point,
            layer,
            outcome = outcome.as_str(),
            message = %message
        ),
        OperationOutcome::Fault => tracing::error!(
            operation,
            point,
            layer,
            outcome = outcome.as_str(),
            message = %message
        ),
    }
}
