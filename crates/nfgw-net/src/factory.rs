//! ---
//! gw_section: "05-networking-external-interfaces"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Remote catalog and command service clients."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
use std::sync::Arc;

use nfgw_common::{BackendKind, GatewayConfig};
use nfgw_core::{BackendFactory, Backends, Result};
use nfgw_logging::{gw_info, LogContext};

use crate::grpc::{GrpcCommandService, GrpcPointService};
use crate::rest::{RestCommandService, RestPointService};

/// Builds network clients for the backend family named in the configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetBackendFactory;

impl BackendFactory for NetBackendFactory {
    fn build(&self, config: &GatewayConfig) -> Result<Backends> {
        let ctx = LogContext::operation("configure").with_layer(&config.layer);
        let timeout = config.request_timeout;
        match config.backend {
            BackendKind::Grpc => {
                gw_info!(
                    context = ctx,
                    "using point service {} and bacnet service {}",
                    config.point_service,
                    config.bacnet_service
                );
                Ok(Backends {
                    points: Arc::new(GrpcPointService::new(&config.point_service, timeout)?),
                    commands: Arc::new(GrpcCommandService::new(&config.bacnet_service, timeout)?),
                })
            }
            BackendKind::Http => {
                gw_info!(context = ctx, "using http api at {}", config.base_url);
                Ok(Backends {
                    points: Arc::new(RestPointService::new(&config.base_url, timeout)?),
                    commands: Arc::new(RestCommandService::new(&config.base_url, timeout)?),
                })
            }
        }
    }
}
