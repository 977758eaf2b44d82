//! ---
//! gw_section: "05-networking-external-interfaces"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Remote catalog and command service clients."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
//! JSON-over-HTTP clients for the point manager API.
//!
//! Bodies follow the proto3 JSON mapping of the structured RPC messages.
//! Commands address points by uuid and layer.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nfgw_core::{
    Addressing, AddressingMode, CatalogEntry, CatalogQuery, CommandService, CommandSession,
    DataQuery, GatewayError, PointBinding, PointPage, PointPageRequest, PointService,
    PointSession, PropertyReference, ProtocolBinding, ReadReply, ReadRequest, RemoteError,
    Result, Sample, TaggedValue, TimeSeries, WriteReply, WriteRequest,
};
use nfgw_logging::{gw_debug, gw_warn, LogContext};
use nfgw_proto::is_bacnet_point_type;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

pub const POINTS_PATH: &str = "api/v1/point/points";
pub const READ_PATH: &str = "api/v1/point/read";
pub const WRITE_PATH: &str = "api/v1/point/write";
pub const DATA_PATH: &str = "api/v1/point/data";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GetPointsBody {
    pub layer: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_query: Option<serde_json::Value>,
    pub page_size: u32,
    pub page_offset: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GetPointsResponse {
    #[serde(default)]
    pub points: Vec<PointBody>,
    #[serde(default)]
    pub total_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PointBody {
    pub uuid: String,
    #[serde(default)]
    pub layer: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    /// `Any` in JSON form: `@type` plus the packed message's fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hpldata: Option<serde_json::Value>,
    /// Proto3 JSON duration, e.g. `"60s"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BacnetPointBody {
    #[serde(default)]
    pub device_address: String,
    #[serde(default)]
    pub property: Option<PropertyReference>,
    #[serde(default)]
    pub example_value: Option<TaggedValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PointAddressBody {
    pub uuid: String,
    pub layer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadBody {
    #[serde(flatten)]
    pub point: PointAddressBody,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReadResponse {
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<CommandErrorBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WriteBody {
    #[serde(flatten)]
    pub point: PointAddressBody,
    pub value: TaggedValue,
    pub priority: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct WriteResponse {
    #[serde(default)]
    pub error: Option<CommandErrorBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorClassCodeBody {
    #[serde(default)]
    pub error_class: u32,
    #[serde(default)]
    pub error_code: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommandErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorClassCodeBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CommandErrorBody {
    /// `None` when no member is set.
    pub fn into_remote(self) -> Option<RemoteError> {
        if let Some(code) = self.error {
            return Some(RemoteError::ClassCode {
                class: code.error_class,
                code: code.error_code,
            });
        }
        self.reject_reason
            .map(RemoteError::Reject)
            .or_else(|| self.abort_reason.map(RemoteError::Abort))
            .or_else(|| self.message.map(RemoteError::Message))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GetDataBody {
    pub layer: String,
    pub uuids: Vec<String>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub window: String,
    pub method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GetDataResponse {
    #[serde(default)]
    pub data: Vec<SeriesBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeriesBody {
    pub uuid: String,
    #[serde(default)]
    pub values: Vec<SampleBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SampleBody {
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub double: f64,
}

impl SampleBody {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        let ts = self.ts.as_deref()?;
        DateTime::parse_from_rfc3339(ts)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }
}

impl SeriesBody {
    /// Samples with a missing or unparseable timestamp are dropped with a
    /// warning.
    pub fn into_series(self) -> TimeSeries {
        let uuid = self.uuid;
        let values = self
            .values
            .into_iter()
            .filter_map(|sample| match sample.timestamp() {
                Some(timestamp) => Some(Sample {
                    timestamp,
                    value: sample.double,
                }),
                None => {
                    gw_warn!(
                        context = LogContext::operation("scrape").with_point(&uuid),
                        "series {}: dropping sample with timestamp {:?}",
                        uuid,
                        sample.ts
                    );
                    None
                }
            })
            .collect();
        TimeSeries { uuid, values }
    }
}

/// Render a duration in proto3 JSON form.
pub fn format_duration(duration: Duration) -> String {
    if duration.subsec_nanos() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}s", duration.as_secs_f64())
    }
}

/// Parse a proto3 JSON duration; negative or malformed input yields `None`.
pub fn parse_duration(text: &str) -> Option<Duration> {
    let seconds: f64 = text.trim().strip_suffix('s')?.parse().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}

impl PointBody {
    pub fn into_entry(self) -> CatalogEntry {
        let binding = self.hpldata.map(binding_from_json);
        CatalogEntry {
            uuid: self.uuid,
            layer: self.layer,
            attrs: self.attrs,
            period: self.period.as_deref().and_then(parse_duration),
            binding,
        }
    }
}

fn binding_from_json(mut any: serde_json::Value) -> ProtocolBinding {
    let type_url = any
        .as_object_mut()
        .and_then(|object| object.remove("@type"))
        .and_then(|value| value.as_str().map(str::to_owned))
        .unwrap_or_default();
    if !is_bacnet_point_type(&type_url) {
        return ProtocolBinding::Undecodable {
            type_url,
            reason: "not a BACnet point binding".into(),
        };
    }
    match serde_json::from_value::<BacnetPointBody>(any) {
        Ok(body) => ProtocolBinding::Bacnet(PointBinding {
            device_address: body.device_address,
            property: body.property,
            example_value: body.example_value,
        }),
        Err(err) => ProtocolBinding::Undecodable {
            type_url,
            reason: err.to_string(),
        },
    }
}

/// Base URL with a trailing slash so relative paths join below it.
pub fn base_url(base: &str) -> Result<Url> {
    let base = base.trim();
    let text = if base.contains("://") {
        base.to_owned()
    } else {
        format!("http://{base}")
    };
    let mut url = Url::parse(&text).map_err(|err| {
        GatewayError::Configuration(format!("invalid base url '{base}': {err}"))
    })?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Shared client settings for both HTTP services.
#[derive(Debug, Clone)]
struct HttpEndpoint {
    base: Url,
    timeout: Duration,
}

impl HttpEndpoint {
    fn new(base: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base: base_url(base)?,
            timeout,
        })
    }

    fn open(&self, service: &str) -> Result<HttpSession> {
        gw_debug!(
            context = LogContext::operation("connect"),
            "opening {} client for {}",
            service,
            self.base
        );
        let client = Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .build()
            .map_err(GatewayError::transport)?;
        Ok(HttpSession {
            client,
            base: self.base.clone(),
        })
    }
}

/// One client, and so one connection pool, per session.
struct HttpSession {
    client: Client,
    base: Url,
}

impl HttpSession {
    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.base.join(path).map_err(|err| {
            GatewayError::Configuration(format!("invalid endpoint path '{path}': {err}"))
        })?;
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(GatewayError::transport)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::RemoteOperation(format!(
                "{path} returned {status}: {}",
                text.trim()
            )));
        }
        let bytes = response.bytes().await.map_err(GatewayError::transport)?;
        serde_json::from_slice(&bytes).map_err(GatewayError::decode)
    }
}

/// Catalog and time-series client for the point manager HTTP API.
#[derive(Debug, Clone)]
pub struct RestPointService {
    endpoint: HttpEndpoint,
}

impl RestPointService {
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: HttpEndpoint::new(base, timeout)?,
        })
    }
}

#[async_trait]
impl PointService for RestPointService {
    async fn connect(&self) -> Result<Box<dyn PointSession>> {
        Ok(Box::new(self.endpoint.open("point manager")?))
    }
}

#[async_trait]
impl PointSession for HttpSession {
    async fn get_points(&mut self, request: PointPageRequest) -> Result<PointPage> {
        let (query, structured_query) = match request.query {
            CatalogQuery::Text(query) => (query, None),
            CatalogQuery::Structured(query) => (String::new(), Some(query)),
        };
        let body = GetPointsBody {
            layer: request.layer,
            query,
            structured_query,
            page_size: request.page_size,
            page_offset: request.page_offset,
        };
        let reply: GetPointsResponse = self.post(POINTS_PATH, &body).await?;
        Ok(PointPage {
            points: reply.points.into_iter().map(PointBody::into_entry).collect(),
            total_count: reply.total_count,
        })
    }

    async fn get_data(&mut self, request: DataQuery) -> Result<Vec<TimeSeries>> {
        let body = GetDataBody {
            layer: request.layer,
            uuids: request.uuids,
            from: request.from,
            to: request.to,
            window: format_duration(request.window),
            method: request.method.as_str().to_owned(),
        };
        let reply: GetDataResponse = self.post(DATA_PATH, &body).await?;
        Ok(reply.data.into_iter().map(SeriesBody::into_series).collect())
    }
}

/// Point read/write client for the point manager HTTP API.
#[derive(Debug, Clone)]
pub struct RestCommandService {
    endpoint: HttpEndpoint,
}

impl RestCommandService {
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: HttpEndpoint::new(base, timeout)?,
        })
    }
}

#[async_trait]
impl CommandService for RestCommandService {
    fn addressing_mode(&self) -> AddressingMode {
        AddressingMode::PointUuid
    }

    async fn connect(&self) -> Result<Box<dyn CommandSession>> {
        Ok(Box::new(self.endpoint.open("command")?))
    }
}

fn point_address(addressing: Addressing) -> Result<PointAddressBody> {
    match addressing {
        Addressing::PointUuid { uuid, layer } => Ok(PointAddressBody { uuid, layer }),
        Addressing::DeviceProperty { device_address, .. } => {
            Err(GatewayError::Configuration(format!(
                "device {device_address}: the HTTP API addresses points by uuid and layer"
            )))
        }
    }
}

#[async_trait]
impl CommandSession for HttpSession {
    async fn read_property(&mut self, request: ReadRequest) -> Result<ReadReply> {
        let body = ReadBody {
            point: point_address(request.addressing)?,
        };
        let reply: ReadResponse = self.post(READ_PATH, &body).await?;
        let value = match reply.value {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::Object(object)) if object.is_empty() => None,
            Some(value) => Some(TaggedValue::from_json(&value)?),
        };
        Ok(ReadReply {
            value,
            error: reply.error.and_then(CommandErrorBody::into_remote),
        })
    }

    async fn write_property(&mut self, request: WriteRequest) -> Result<WriteReply> {
        let body = WriteBody {
            point: point_address(request.addressing)?,
            value: request.value,
            priority: request.priority,
        };
        let reply: WriteResponse = self.post(WRITE_PATH, &body).await?;
        Ok(WriteReply {
            error: reply.error.and_then(CommandErrorBody::into_remote),
        })
    }
}
