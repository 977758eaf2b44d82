//! ---
//! gw_section: "05-networking-external-interfaces"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Remote catalog and command service clients."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
//! Conversions between the generated protobuf types and core types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use nfgw_common::time::{from_seconds_nanos, to_seconds_nanos};
use nfgw_core::{
    AggregationMethod, CatalogEntry, ObjectId, PointBinding, PropertyReference, ProtocolBinding,
    RemoteError, Sample, TaggedValue, TimeSeries,
};
use nfgw_logging::{gw_warn, LogContext};
use nfgw_proto::bacnet::{
    self, application_data_value, command_error, ApplicationDataValue, BacnetPoint,
    ObjectIdentifier, ObjectPropertyReference,
};
use nfgw_proto::{hpl, is_bacnet_point_type, BACNET_POINT_TYPE_URL};
use prost::Message;
use prost_types::value::Kind;
use prost_types::{Struct, Timestamp, Value};

/// `None` when no variant is populated.
pub fn tagged_from_proto(value: ApplicationDataValue) -> Option<TaggedValue> {
    use application_data_value::Value as V;
    Some(match value.value? {
        V::Null(_) => TaggedValue::Null,
        V::Boolean(b) => TaggedValue::Bool(b),
        V::Unsigned(u) => TaggedValue::Unsigned(u),
        V::Signed(i) => TaggedValue::Signed(i),
        V::Real(r) => TaggedValue::Real(r),
        V::Double(d) => TaggedValue::Double(d),
        V::CharacterString(s) => TaggedValue::String(s),
    })
}

pub fn tagged_to_proto(value: &TaggedValue) -> ApplicationDataValue {
    use application_data_value::Value as V;
    let value = match value {
        TaggedValue::Null => V::Null(true),
        TaggedValue::Bool(b) => V::Boolean(*b),
        TaggedValue::Unsigned(u) => V::Unsigned(*u),
        TaggedValue::Signed(i) => V::Signed(*i),
        TaggedValue::Real(r) => V::Real(*r),
        TaggedValue::Double(d) => V::Double(*d),
        TaggedValue::String(s) => V::CharacterString(s.clone()),
    };
    ApplicationDataValue { value: Some(value) }
}

pub fn property_from_proto(reference: ObjectPropertyReference) -> Option<PropertyReference> {
    let object_id = reference.object_id?;
    Some(PropertyReference {
        object_id: ObjectId {
            object_type: object_id.object_type,
            instance: object_id.instance,
        },
        property_id: reference.property_id,
        array_index: reference.array_index,
    })
}

pub fn property_to_proto(reference: &PropertyReference) -> ObjectPropertyReference {
    ObjectPropertyReference {
        object_id: Some(ObjectIdentifier {
            object_type: reference.object_id.object_type,
            instance: reference.object_id.instance,
        }),
        property_id: reference.property_id,
        array_index: reference.array_index,
    }
}

/// `None` when the reply carried no error or an error with no member set.
pub fn remote_error_from_proto(error: Option<bacnet::CommandError>) -> Option<RemoteError> {
    match error?.error_type? {
        command_error::ErrorType::Error(code) => Some(RemoteError::ClassCode {
            class: code.error_class,
            code: code.error_code,
        }),
        command_error::ErrorType::RejectReason(reason) => Some(RemoteError::Reject(reason)),
        command_error::ErrorType::AbortReason(reason) => Some(RemoteError::Abort(reason)),
    }
}

pub fn remote_error_to_proto(error: &RemoteError) -> bacnet::CommandError {
    let error_type = match error {
        RemoteError::ClassCode { class, code } => {
            command_error::ErrorType::Error(bacnet::ErrorClassCode {
                error_class: *class,
                error_code: *code,
            })
        }
        RemoteError::Reject(reason) => command_error::ErrorType::RejectReason(reason.clone()),
        RemoteError::Abort(reason) | RemoteError::Message(reason) => {
            command_error::ErrorType::AbortReason(reason.clone())
        }
    };
    bacnet::CommandError {
        error_type: Some(error_type),
    }
}

/// Catalog entry from a listed point. Undecodable bindings are kept as
/// [`ProtocolBinding::Undecodable`] so the synchronizer can report them.
pub fn entry_from_point(point: hpl::Point) -> CatalogEntry {
    let binding = point.hpldata.map(|any| {
        if !is_bacnet_point_type(&any.type_url) {
            return ProtocolBinding::Undecodable {
                reason: "not a BACnet point binding".into(),
                type_url: any.type_url,
            };
        }
        match BacnetPoint::decode(any.value.as_slice()) {
            Ok(bacnet) => ProtocolBinding::Bacnet(PointBinding {
                device_address: bacnet.device_address,
                property: bacnet.property.and_then(property_from_proto),
                example_value: bacnet.example_value.and_then(tagged_from_proto),
            }),
            Err(err) => ProtocolBinding::Undecodable {
                type_url: any.type_url,
                reason: err.to_string(),
            },
        }
    });
    CatalogEntry {
        uuid: point.uuid,
        layer: point.layer,
        attrs: point.attrs.into_iter().collect(),
        period: point.period.and_then(|period| Duration::try_from(period).ok()),
        binding,
    }
}

/// Pack a BACnet binding into `Point.hpldata`.
pub fn pack_bacnet_point(point: &BacnetPoint) -> prost_types::Any {
    prost_types::Any {
        type_url: BACNET_POINT_TYPE_URL.to_owned(),
        value: point.encode_to_vec(),
    }
}

pub fn timestamp_from(ts: DateTime<Utc>) -> Timestamp {
    let (seconds, nanos) = to_seconds_nanos(ts);
    Timestamp { seconds, nanos }
}

pub fn timestamp_to(ts: &Timestamp) -> Option<DateTime<Utc>> {
    from_seconds_nanos(ts.seconds, ts.nanos)
}

pub fn duration_to_proto(duration: Duration) -> prost_types::Duration {
    prost_types::Duration::try_from(duration).unwrap_or(prost_types::Duration {
        seconds: i64::MAX,
        nanos: 0,
    })
}

pub fn method_to_proto(method: AggregationMethod) -> hpl::Method {
    match method {
        AggregationMethod::First => hpl::Method::First,
        AggregationMethod::Last => hpl::Method::Last,
        AggregationMethod::Avg => hpl::Method::Avg,
        AggregationMethod::Min => hpl::Method::Min,
        AggregationMethod::Max => hpl::Method::Max,
    }
}

/// Samples whose timestamp is missing or out of range are dropped with a
/// warning; the rest of the series is kept.
pub fn series_from_proto(series: hpl::TimeSeries) -> TimeSeries {
    let uuid = series.uuid;
    let values = series
        .values
        .into_iter()
        .filter_map(|sample| match sample.ts.as_ref().and_then(timestamp_to) {
            Some(timestamp) => Some(Sample {
                timestamp,
                value: sample.double,
            }),
            None => {
                gw_warn!(
                    context = LogContext::operation("scrape").with_point(&uuid),
                    "series {}: dropping sample without a valid timestamp",
                    uuid
                );
                None
            }
        })
        .collect();
    TimeSeries { uuid, values }
}

pub fn json_to_struct(value: serde_json::Value) -> Struct {
    match value {
        serde_json::Value::Object(map) => Struct {
            fields: map
                .into_iter()
                .map(|(k, v)| (k, json_to_prost(v)))
                .collect(),
        },
        other => Struct {
            fields: std::iter::once(("value".to_string(), json_to_prost(other))).collect(),
        },
    }
}

fn json_to_prost(value: serde_json::Value) -> Value {
    let kind = match value {
        serde_json::Value::Null => Kind::NullValue(0),
        serde_json::Value::Bool(b) => Kind::BoolValue(b),
        serde_json::Value::Number(num) => Kind::NumberValue(num.as_f64().unwrap_or_default()),
        serde_json::Value::String(s) => Kind::StringValue(s),
        serde_json::Value::Array(arr) => Kind::ListValue(prost_types::ListValue {
            values: arr.into_iter().map(json_to_prost).collect(),
        }),
        serde_json::Value::Object(map) => Kind::StructValue(Struct {
            fields: map
                .into_iter()
                .map(|(k, v)| (k, json_to_prost(v)))
                .collect(),
        }),
    };
    Value { kind: Some(kind) }
}

pub fn struct_to_json(struct_: Struct) -> serde_json::Value {
    serde_json::Value::Object(
        struct_
            .fields
            .into_iter()
            .map(|(k, v)| (k, prost_to_json(v)))
            .collect(),
    )
}

fn prost_to_json(value: Value) -> serde_json::Value {
    match value.kind {
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::NumberValue(n)) => serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(prost_to_json).collect())
        }
        Some(Kind::StructValue(struct_)) => struct_to_json(struct_),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn bacnet_point() -> BacnetPoint {
        BacnetPoint {
            device_address: "10.0.1.50:47808".into(),
            property: Some(ObjectPropertyReference {
                object_id: Some(ObjectIdentifier {
                    object_type: 2,
                    instance: 7,
                }),
                property_id: 85,
                array_index: None,
            }),
            example_value: Some(ApplicationDataValue {
                value: Some(application_data_value::Value::Real(20.5)),
            }),
        }
    }

    #[test]
    fn point_with_bacnet_binding_decodes() {
        let point = hpl::Point {
            uuid: "u-1".into(),
            layer: "hpl:bacnet:1".into(),
            attrs: HashMap::from([("prop_units".to_owned(), "percent".to_owned())]),
            hpldata: Some(pack_bacnet_point(&bacnet_point())),
            period: Some(prost_types::Duration {
                seconds: 60,
                nanos: 0,
            }),
        };
        let entry = entry_from_point(point);
        assert_eq!(entry.period, Some(Duration::from_secs(60)));
        match entry.binding {
            Some(ProtocolBinding::Bacnet(binding)) => {
                assert_eq!(binding.device_address, "10.0.1.50:47808");
                assert_eq!(binding.example_value, Some(TaggedValue::Real(20.5)));
                assert_eq!(binding.property.map(|p| p.object_id.instance), Some(7));
            }
            other => panic!("unexpected binding {other:?}"),
        }
    }

    #[test]
    fn foreign_binding_is_undecodable() {
        let point = hpl::Point {
            uuid: "u-2".into(),
            hpldata: Some(prost_types::Any {
                type_url: "type.googleapis.com/normalgw.modbus.v1.ModbusPoint".into(),
                value: vec![1, 2, 3],
            }),
            ..Default::default()
        };
        assert!(matches!(
            entry_from_point(point).binding,
            Some(ProtocolBinding::Undecodable { .. })
        ));
    }

    #[test]
    fn empty_application_value_has_no_variant() {
        assert_eq!(tagged_from_proto(ApplicationDataValue { value: None }), None);
        assert_eq!(
            tagged_from_proto(tagged_to_proto(&TaggedValue::Signed(-3))),
            Some(TaggedValue::Signed(-3))
        );
    }

    #[test]
    fn empty_command_error_is_no_error() {
        assert_eq!(remote_error_from_proto(None), None);
        assert_eq!(
            remote_error_from_proto(Some(bacnet::CommandError { error_type: None })),
            None
        );
        let err = RemoteError::ClassCode { class: 2, code: 31 };
        assert_eq!(
            remote_error_from_proto(Some(remote_error_to_proto(&err))),
            Some(err)
        );
    }

    #[test]
    fn structured_query_survives_struct_conversion() {
        let query = json!({ "and": [{ "field": "period", "gte": 1.0 }], "layer": "hpl:bacnet:1" });
        assert_eq!(struct_to_json(json_to_struct(query.clone())), query);
    }

    #[test]
    fn bad_samples_are_dropped_without_losing_the_batch() {
        let ts = |seconds| Some(Timestamp { seconds, nanos: 0 });
        let data = vec![
            hpl::TimeSeries {
                uuid: "u-bad".into(),
                values: vec![
                    hpl::Sample {
                        ts: None,
                        double: 1.0,
                    },
                    hpl::Sample {
                        ts: ts(i64::MAX),
                        double: 2.0,
                    },
                    hpl::Sample {
                        ts: ts(1_700_000_000),
                        double: 3.0,
                    },
                ],
            },
            hpl::TimeSeries {
                uuid: "u-good".into(),
                values: vec![hpl::Sample {
                    ts: ts(1_700_000_060),
                    double: 4.0,
                }],
            },
        ];

        let series: Vec<TimeSeries> = data.into_iter().map(series_from_proto).collect();

        assert_eq!(series.len(), 2);
        let bad: Vec<f64> = series[0].values.iter().map(|s| s.value).collect();
        assert_eq!(bad, vec![3.0]);
        assert_eq!(series[1].uuid, "u-good");
        assert_eq!(series[1].values[0].value, 4.0);
        assert_eq!(series[1].values[0].timestamp.timestamp(), 1_700_000_060);
    }

    #[test]
    fn unversioned_bacnet_type_url_decodes() {
        let mut any = pack_bacnet_point(&bacnet_point());
        any.type_url = "type.googleapis.com/normalgw.bacnet.BACnetPoint".into();
        let point = hpl::Point {
            uuid: "u-3".into(),
            hpldata: Some(any),
            ..Default::default()
        };
        assert!(matches!(
            entry_from_point(point).binding,
            Some(ProtocolBinding::Bacnet(_))
        ));
    }
}
