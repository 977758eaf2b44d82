//! ---
//! gw_section: "05-networking-external-interfaces"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Remote catalog and command service clients."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
//! Structured RPC clients for the point manager and BACnet services.
//!
//! Every session dials its own channel and drops it with the session.

use std::time::Duration;

use async_trait::async_trait;
use nfgw_core::{
    Addressing, AddressingMode, CatalogQuery, CommandService, CommandSession, DataQuery,
    GatewayError, PointPage, PointPageRequest, PointService, PointSession, ReadReply,
    ReadRequest, Result, TimeSeries, WriteReply, WriteRequest,
};
use nfgw_logging::{gw_debug, LogContext};
use nfgw_proto::bacnet::bacnet_client::BacnetClient;
use nfgw_proto::bacnet::{ReadPropertyRequest, WritePropertyRequest};
use nfgw_proto::hpl::point_manager_client::PointManagerClient;
use nfgw_proto::hpl::{GetDataRequest, GetPointsRequest};
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Status};

use crate::convert::{
    duration_to_proto, entry_from_point, json_to_struct, method_to_proto, property_to_proto,
    remote_error_from_proto, series_from_proto, tagged_from_proto, tagged_to_proto,
    timestamp_from,
};

/// Endpoint for `address`, which may omit its scheme (`localhost:8080`).
pub fn endpoint(address: &str, timeout: Duration) -> Result<Endpoint> {
    let address = address.trim();
    let uri = if address.contains("://") {
        address.to_owned()
    } else {
        format!("http://{address}")
    };
    let endpoint = Endpoint::from_shared(uri).map_err(|err| {
        GatewayError::Configuration(format!("invalid service address '{address}': {err}"))
    })?;
    Ok(endpoint.connect_timeout(timeout).timeout(timeout))
}

fn status_error(status: Status) -> GatewayError {
    GatewayError::Transport(format!("{:?}: {}", status.code(), status.message()))
}

async fn dial(endpoint: &Endpoint, service: &str) -> Result<Channel> {
    gw_debug!(
        context = LogContext::operation("connect"),
        "opening {} channel to {}",
        service,
        endpoint.uri()
    );
    endpoint.connect().await.map_err(GatewayError::transport)
}

/// Catalog and time-series client for `normalgw.hpl.v1.PointManager`.
#[derive(Debug, Clone)]
pub struct GrpcPointService {
    endpoint: Endpoint,
}

impl GrpcPointService {
    pub fn new(address: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: endpoint(address, timeout)?,
        })
    }
}

#[async_trait]
impl PointService for GrpcPointService {
    async fn connect(&self) -> Result<Box<dyn PointSession>> {
        let channel = dial(&self.endpoint, "point manager").await?;
        Ok(Box::new(GrpcPointSession {
            client: PointManagerClient::new(channel),
        }))
    }
}

struct GrpcPointSession {
    client: PointManagerClient<Channel>,
}

#[async_trait]
impl PointSession for GrpcPointSession {
    async fn get_points(&mut self, request: PointPageRequest) -> Result<PointPage> {
        let (query, structured_query) = match request.query {
            CatalogQuery::Text(query) => (query, None),
            CatalogQuery::Structured(query) => (String::new(), Some(json_to_struct(query))),
        };
        let reply = self
            .client
            .get_points(Request::new(GetPointsRequest {
                layer: request.layer,
                query,
                structured_query,
                page_size: request.page_size,
                page_offset: request.page_offset,
            }))
            .await
            .map_err(status_error)?
            .into_inner();
        Ok(PointPage {
            points: reply.points.into_iter().map(entry_from_point).collect(),
            total_count: u64::from(reply.total_count),
        })
    }

    async fn get_data(&mut self, request: DataQuery) -> Result<Vec<TimeSeries>> {
        let reply = self
            .client
            .get_data(Request::new(GetDataRequest {
                layer: request.layer,
                uuids: request.uuids,
                from: Some(timestamp_from(request.from)),
                to: Some(timestamp_from(request.to)),
                window: Some(duration_to_proto(request.window)),
                method: method_to_proto(request.method) as i32,
            }))
            .await
            .map_err(status_error)?
            .into_inner();
        Ok(reply.data.into_iter().map(series_from_proto).collect())
    }
}

/// Property read/write client for `normalgw.bacnet.v1.Bacnet`.
#[derive(Debug, Clone)]
pub struct GrpcCommandService {
    endpoint: Endpoint,
}

impl GrpcCommandService {
    pub fn new(address: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: endpoint(address, timeout)?,
        })
    }
}

#[async_trait]
impl CommandService for GrpcCommandService {
    fn addressing_mode(&self) -> AddressingMode {
        AddressingMode::DeviceProperty
    }

    async fn connect(&self) -> Result<Box<dyn CommandSession>> {
        let channel = dial(&self.endpoint, "bacnet").await?;
        Ok(Box::new(GrpcCommandSession {
            client: BacnetClient::new(channel),
        }))
    }
}

struct GrpcCommandSession {
    client: BacnetClient<Channel>,
}

fn device_property(
    addressing: Addressing,
) -> Result<(String, nfgw_proto::bacnet::ObjectPropertyReference)> {
    match addressing {
        Addressing::DeviceProperty {
            device_address,
            property,
        } => Ok((device_address, property_to_proto(&property))),
        Addressing::PointUuid { uuid, .. } => Err(GatewayError::Configuration(format!(
            "point {uuid}: the BACnet service addresses points by device and property"
        ))),
    }
}

#[async_trait]
impl CommandSession for GrpcCommandSession {
    async fn read_property(&mut self, request: ReadRequest) -> Result<ReadReply> {
        let (device_address, property) = device_property(request.addressing)?;
        let reply = self
            .client
            .read_property(Request::new(ReadPropertyRequest {
                device_address,
                property: Some(property),
            }))
            .await
            .map_err(status_error)?
            .into_inner();
        Ok(ReadReply {
            value: reply.value.and_then(tagged_from_proto),
            error: remote_error_from_proto(reply.error),
        })
    }

    async fn write_property(&mut self, request: WriteRequest) -> Result<WriteReply> {
        let (device_address, property) = device_property(request.addressing)?;
        let reply = self
            .client
            .write_property(Request::new(WritePropertyRequest {
                device_address,
                property: Some(property),
                value: Some(tagged_to_proto(&request.value)),
                priority: u32::from(request.priority),
            }))
            .await
            .map_err(status_error)?
            .into_inner();
        Ok(WriteReply {
            error: remote_error_from_proto(reply.error),
        })
    }
}
