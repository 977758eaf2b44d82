//! ---
//! gw_section: "01-core-functionality"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Shared primitives and utilities for the gateway runtime."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, DurationSeconds, PickFirst};
use tracing::debug;

use crate::logging::LogFormat;

/// Template applied when `topic_name_format` is absent or cannot be rendered.
pub const DEFAULT_TOPIC_NAME_FORMAT: &str =
    "{uuid}/device_id:{device_id}/device_name:{device_prop_object_name}/object_name:{prop_object_name}";

/// Lowest and highest BACnet command priority.
pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 16;

fn default_service_endpoint() -> String {
    "localhost:8080".to_owned()
}

fn default_base_url() -> String {
    "http://localhost:8080".to_owned()
}

fn default_scrape_window() -> Duration {
    Duration::from_secs(300)
}

fn default_priority() -> u8 {
    14
}

fn default_query() -> String {
    "@period:[1, +inf]".to_owned()
}

fn default_layer() -> String {
    "hpl:bacnet:1".to_owned()
}

fn default_topic_name_format() -> String {
    DEFAULT_TOPIC_NAME_FORMAT.to_owned()
}

fn default_page_size() -> u32 {
    100
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("logs")
}

/// Which remote backend family serves catalog, command, and time-series calls.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Structured RPC services addressed by device address and property reference.
    #[default]
    Grpc,
    /// JSON-over-HTTP services addressed by point uuid and layer.
    Http,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "grpc" => Ok(BackendKind::Grpc),
            "http" => Ok(BackendKind::Http),
            other => Err(format!("unknown backend: {}", other)),
        }
    }
}

/// Options recognised by the gateway interface.
///
/// Hosts hand over their configuration mapping as-is; keys the gateway does
/// not know are ignored. Numeric options accept either numbers or numeric
/// strings since host configuration files are frequently string-typed.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayConfig {
    #[serde(default = "default_service_endpoint")]
    pub point_service: String,
    #[serde(default = "default_service_endpoint")]
    pub bacnet_service: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_scrape_window")]
    #[serde_as(as = "PickFirst<(DurationSeconds<u64>, DurationSeconds<String>)>")]
    pub scrape_window: Duration,
    #[serde(default = "default_priority")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub priority: u8,
    #[serde(default = "default_query")]
    pub query: String,
    #[serde(default)]
    pub structured_query: Option<serde_json::Value>,
    #[serde(default = "default_layer")]
    pub layer: String,
    #[serde(default = "default_topic_name_format")]
    pub topic_name_format: String,
    #[serde(default = "default_page_size")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub page_size: u32,
    #[serde(default = "default_request_timeout")]
    #[serde_as(as = "PickFirst<(DurationSeconds<u64>, DurationSeconds<String>)>")]
    pub request_timeout: Duration,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Build a configuration from the host's option mapping.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let config: GatewayConfig = serde_json::from_value(value)
            .with_context(|| "failed to interpret gateway configuration")?;
        config.validate()?;
        debug!(
            backend = ?config.backend,
            layer = %config.layer,
            priority = config.priority,
            scrape_window_secs = config.scrape_window.as_secs(),
            "gateway configuration loaded"
        );
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority) {
            return Err(anyhow!(
                "priority {} outside of the command priority range {}..={}",
                self.priority,
                MIN_PRIORITY,
                MAX_PRIORITY
            ));
        }
        if self.scrape_window.is_zero() {
            return Err(anyhow!("scrape_window must be at least one second"));
        }
        if self.request_timeout.is_zero() {
            return Err(anyhow!("request_timeout must be at least one second"));
        }
        if self.page_size == 0 {
            return Err(anyhow!("page_size must be greater than zero"));
        }
        if self.layer.trim().is_empty() {
            return Err(anyhow!("layer cannot be empty"));
        }
        match self.backend {
            BackendKind::Grpc => {
                if self.point_service.trim().is_empty() || self.bacnet_service.trim().is_empty() {
                    return Err(anyhow!(
                        "grpc backend requires both point_service and bacnet_service"
                    ));
                }
            }
            BackendKind::Http => {
                if self.base_url.trim().is_empty() {
                    return Err(anyhow!("http backend requires base_url"));
                }
            }
        }
        if let Some(query) = &self.structured_query {
            if !query.is_object() {
                return Err(anyhow!("structured_query must be a JSON object"));
            }
        }
        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            point_service: default_service_endpoint(),
            bacnet_service: default_service_endpoint(),
            base_url: default_base_url(),
            backend: BackendKind::default(),
            scrape_window: default_scrape_window(),
            priority: default_priority(),
            query: default_query(),
            structured_query: None,
            layer: default_layer(),
            topic_name_format: default_topic_name_format(),
            page_size: default_page_size(),
            request_timeout: default_request_timeout(),
            logging: LoggingConfig::default(),
        }
    }
}

impl std::str::FromStr for GatewayConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: GatewayConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default)]
    pub file_prefix: Option<String>,
    #[serde(default)]
    pub format: LogFormat,
    /// Also write a daily rolling JSON file under `directory`.
    #[serde(default)]
    pub file_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            file_prefix: None,
            format: LogFormat::default(),
            file_output: false,
        }
    }
}
