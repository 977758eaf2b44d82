//! ---
//! gw_section: "15-testing-qa-runbook"
//! gw_subsection: "integration-tests"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Integration and validation tests for the point gateway."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use nfgw_common::{BackendKind, GatewayConfig};
use nfgw_core::{GatewayInterface, MemoryRegistry, PointInterface, RegisterProvider};
use nfgw_net::NetBackendFactory;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

const TYPE_URL: &str = "type.googleapis.com/normalgw.bacnet.v1.BacnetPoint";

#[derive(Default)]
struct PointManager {
    values: HashMap<String, Value>,
    writes: Vec<Value>,
}

type Shared = Arc<Mutex<PointManager>>;

fn point(uuid: &str, name: &str, instance: u32, example: Value) -> Value {
    json!({
        "uuid": uuid,
        "layer": "hpl:bacnet:1",
        "attrs": {
            "device_id": "260001",
            "device_prop_object_name": "AHU-1",
            "prop_object_name": name,
            "prop_units": "degrees-celsius"
        },
        "period": "60s",
        "hpldata": {
            "@type": TYPE_URL,
            "deviceAddress": "10.0.1.50:47808",
            "property": { "objectId": { "objectType": 2, "instance": instance }, "propertyId": 85 },
            "exampleValue": example
        }
    })
}

async fn points(Json(body): Json<Value>) -> Json<Value> {
    let catalog = vec![
        point("uuid-sat", "SA-T", 1, json!({ "real": 0.0 })),
        point("uuid-occ", "OCC-CMD", 2, json!({ "boolean": false })),
        point("uuid-spt", "SA-SPT", 3, json!({ "double": 0.0 })),
    ];
    let offset = body["pageOffset"].as_u64().unwrap_or(0) as usize;
    let size = body["pageSize"].as_u64().unwrap_or(100) as usize;
    let page: Vec<Value> = catalog.iter().skip(offset).take(size).cloned().collect();
    Json(json!({ "points": page, "totalCount": catalog.len() }))
}

async fn read(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let uuid = body["uuid"].as_str().unwrap_or_default();
    match state.lock().values.get(uuid) {
        Some(value) => Json(json!({ "value": value })),
        None => Json(json!({ "value": { "real": 20.5 } })),
    }
}

async fn write(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let mut state = state.lock();
    let uuid = body["uuid"].as_str().unwrap_or_default().to_owned();
    if uuid == "uuid-occ" && body["value"] != json!({ "null": true }) {
        state.writes.push(body);
        return Json(json!({ "error": { "rejectReason": "write access denied" } }));
    }
    state.values.insert(uuid, body["value"].clone());
    state.writes.push(body);
    Json(json!({}))
}

async fn data(Json(body): Json<Value>) -> Json<Value> {
    let to = body["to"].clone();
    let series: Vec<Value> = body["uuids"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, uuid)| json!({ "uuid": uuid, "values": [{ "ts": to, "double": 10.0 + i as f64 }] }))
        .collect();
    Json(json!({ "data": series }))
}

async fn serve() -> (SocketAddr, Shared) {
    let state: Shared = Arc::default();
    let router = Router::new()
        .route("/api/v1/point/points", post(points))
        .route("/api/v1/point/read", post(read))
        .route("/api/v1/point/write", post(write))
        .route("/api/v1/point/data", post(data))
        .with_state(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (address, state)
}

fn config(address: SocketAddr) -> GatewayConfig {
    GatewayConfig::from_value(json!({
        "backend": "http",
        "base_url": format!("http://{address}"),
        "topic_name_format": "{device_prop_object_name}/{prop_object_name}",
        "page_size": "2",
        "priority": "12"
    }))
    .unwrap()
}

#[tokio::test]
async fn gateway_drives_http_point_manager() {
    let (address, state) = serve().await;
    let mut gateway = GatewayInterface::new(MemoryRegistry::new(), Arc::new(NetBackendFactory));
    let config = config(address);
    assert_eq!(config.backend, BackendKind::Http);

    let report = gateway.configure(config).await.unwrap();
    assert!(report.is_complete(), "{:?}", report.errors);
    assert_eq!(report.pages, 2);
    assert_eq!(
        gateway.registry().register_names(),
        vec!["AHU-1/SA-T", "AHU-1/OCC-CMD", "AHU-1/SA-SPT"]
    );

    assert_eq!(gateway.get_point("AHU-1/SA-T").await.unwrap(), json!(20.5));

    gateway
        .set_point("AHU-1/SA-SPT", json!(21.5), None)
        .await
        .unwrap();
    assert_eq!(gateway.get_point("AHU-1/SA-SPT").await.unwrap(), json!(21.5));

    let rejected = gateway
        .set_point("AHU-1/OCC-CMD", json!(true), Some(8))
        .await
        .unwrap_err();
    assert!(rejected.to_string().contains("write access denied"));
    assert_eq!(gateway.written_points(), vec!["AHU-1/SA-SPT".to_owned()]);

    let scraped = gateway.scrape_all().await.unwrap();
    assert_eq!(scraped.len(), 3);
    assert_eq!(scraped["AHU-1/SA-T"], 10.0);

    let reverted = gateway.revert_all(None).await;
    assert!(reverted.is_complete());
    assert!(gateway.written_points().is_empty());

    let writes = state.lock().writes.clone();
    assert_eq!(
        writes[0],
        json!({
            "uuid": "uuid-spt",
            "layer": "hpl:bacnet:1",
            "value": { "double": 21.5 },
            "priority": 12
        })
    );
    let last = writes.last().unwrap();
    assert_eq!(last["value"], json!({ "null": true }));
    assert_eq!(last["priority"], 12);
}
