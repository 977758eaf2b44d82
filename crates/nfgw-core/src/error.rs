//! ---
//! gw_section: "01-core-functionality"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Catalog synchronization and command translation core."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
use std::fmt::Display;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("remote operation failed: {0}")]
    RemoteOperation(String),
    #[error("point not found: {0}")]
    NotFound(String),
    #[error("catalog consistency violated: {0}")]
    Consistency(String),
    #[error("value conversion failed: {0}")]
    ValueConversion(String),
    #[error("decoding failed: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn transport(err: impl Display) -> Self {
        GatewayError::Transport(err.to_string())
    }

    pub fn remote(err: impl Display) -> Self {
        GatewayError::RemoteOperation(err.to_string())
    }

    pub fn decode(err: impl Display) -> Self {
        GatewayError::Decode(err.to_string())
    }

    /// Short label used for metric labels and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Configuration(_) => "configuration",
            GatewayError::Transport(_) => "transport",
            GatewayError::RemoteOperation(_) => "remote_operation",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::Consistency(_) => "consistency",
            GatewayError::ValueConversion(_) => "value_conversion",
            GatewayError::Decode(_) => "decode",
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Decode(err.to_string())
    }
}
