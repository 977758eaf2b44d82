//! ---
//! gw_section: "01-core-functionality"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Catalog synchronization and command translation core."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
//! Read, write, and revert commands against the remote command service.

use nfgw_common::{MAX_PRIORITY, MIN_PRIORITY};
use nfgw_logging::{gw_debug, gw_error, gw_info, LogContext};
use serde_json::Value;

use crate::codec::ValueCodec;
use crate::descriptor::{PointDescriptor, Register};
use crate::error::{GatewayError, Result};
use crate::metrics::{GatewayMetrics, MetricsExt};
use crate::service::{Addressing, AddressingMode, CommandService, ReadRequest, WriteRequest};

/// Builds typed command requests for registered points.
#[derive(Debug, Clone)]
pub struct CommandTranslator {
    layer: String,
    default_priority: u8,
}

impl CommandTranslator {
    pub fn new(layer: impl Into<String>, default_priority: u8) -> Self {
        Self {
            layer: layer.into(),
            default_priority,
        }
    }

    pub fn default_priority(&self) -> u8 {
        self.default_priority
    }

    /// Caller priority when given, the configured default otherwise.
    pub fn resolve_priority(&self, priority: Option<u8>) -> Result<u8> {
        let resolved = priority.unwrap_or(self.default_priority);
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&resolved) {
            return Err(GatewayError::Configuration(format!(
                "priority {resolved} outside {MIN_PRIORITY}..={MAX_PRIORITY}"
            )));
        }
        Ok(resolved)
    }

    pub fn addressing(&self, mode: AddressingMode, descriptor: &PointDescriptor) -> Addressing {
        match mode {
            AddressingMode::DeviceProperty => Addressing::DeviceProperty {
                device_address: descriptor.device_address.clone(),
                property: descriptor.property,
            },
            AddressingMode::PointUuid => Addressing::PointUuid {
                uuid: descriptor.uuid.clone(),
                layer: if descriptor.layer.is_empty() {
                    self.layer.clone()
                } else {
                    descriptor.layer.clone()
                },
            },
        }
    }

    /// Read the present value of a point.
    pub async fn read(
        &self,
        service: &dyn CommandService,
        register: &Register,
        metrics: Option<&GatewayMetrics>,
    ) -> Result<Value> {
        let ctx = LogContext::operation("read")
            .with_point(register.name())
            .with_layer(&self.layer);
        let request = ReadRequest {
            addressing: self.addressing(service.addressing_mode(), register.descriptor()),
        };

        let result: Result<Value> = async {
            let mut session = service.connect().await?;
            let reply = session.read_property(request).await?;
            if let Some(err) = reply.error {
                return Err(GatewayError::remote(err));
            }
            ValueCodec::decode(reply.value.as_ref())
        }
        .await;

        match &result {
            Ok(value) => {
                metrics.call("read", "success");
                gw_debug!(context = ctx, "read {}", value);
            }
            Err(err) => {
                metrics.call("read", "fault");
                gw_error!(context = ctx, error = err, "read failed");
            }
        }
        result
    }

    /// Write `value` at the resolved priority and return that priority.
    pub async fn write(
        &self,
        service: &dyn CommandService,
        register: &Register,
        value: &Value,
        priority: Option<u8>,
        metrics: Option<&GatewayMetrics>,
    ) -> Result<u8> {
        self.command("write", service, register, value, priority, metrics)
            .await
    }

    /// Release the hold at one priority by writing null there.
    pub async fn revert(
        &self,
        service: &dyn CommandService,
        register: &Register,
        priority: Option<u8>,
        metrics: Option<&GatewayMetrics>,
    ) -> Result<u8> {
        self.command("revert", service, register, &Value::Null, priority, metrics)
            .await
    }

    async fn command(
        &self,
        operation: &'static str,
        service: &dyn CommandService,
        register: &Register,
        value: &Value,
        priority: Option<u8>,
        metrics: Option<&GatewayMetrics>,
    ) -> Result<u8> {
        let ctx = LogContext::operation(operation)
            .with_point(register.name())
            .with_layer(&self.layer);
        let descriptor = register.descriptor();

        let result: Result<u8> = async {
            let priority = self.resolve_priority(priority)?;
            let encoded = ValueCodec::encode(descriptor.variant(), value)?;
            let request = WriteRequest {
                addressing: self.addressing(service.addressing_mode(), descriptor),
                value: encoded,
                priority,
            };
            let mut session = service.connect().await?;
            let reply = session.write_property(request).await?;
            match reply.error {
                Some(err) => Err(GatewayError::remote(err)),
                None => Ok(priority),
            }
        }
        .await;

        match &result {
            Ok(priority) => {
                metrics.call(operation, "success");
                gw_info!(context = ctx, "{} accepted at priority {}", operation, priority);
            }
            Err(err) => {
                metrics.call(operation, "fault");
                gw_error!(context = ctx, error = err, "{} failed", operation);
            }
        }
        result
    }
}
