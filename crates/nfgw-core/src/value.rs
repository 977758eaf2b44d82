//! ---
//! gw_section: "01-core-functionality"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Catalog synchronization and command translation core."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
//! Tagged scalar values exchanged with field devices.
//!
//! The JSON form is a single-key object following the proto3 JSON mapping of
//! `ApplicationDataValue`: 64-bit integers are written as decimal strings and
//! read back from either strings or numbers, non-finite floats travel as the
//! strings `"NaN"`, `"Infinity"` and `"-Infinity"`.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

use crate::error::{GatewayError, Result};

/// A device value with exactly one populated variant.
#[derive(Debug, Clone, PartialEq)]
pub enum TaggedValue {
    Null,
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Real(f32),
    Double(f64),
    String(String),
}

/// Discriminant of a [`TaggedValue`], used to declare a point's wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantTag {
    Null,
    Bool,
    Unsigned,
    Signed,
    Real,
    Double,
    String,
}

impl VariantTag {
    /// Field name of the variant in the JSON form.
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantTag::Null => "null",
            VariantTag::Bool => "boolean",
            VariantTag::Unsigned => "unsigned",
            VariantTag::Signed => "signed",
            VariantTag::Real => "real",
            VariantTag::Double => "double",
            VariantTag::String => "characterString",
        }
    }
}

impl fmt::Display for VariantTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariantTag {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "null" => Ok(VariantTag::Null),
            "boolean" => Ok(VariantTag::Bool),
            "unsigned" => Ok(VariantTag::Unsigned),
            "signed" => Ok(VariantTag::Signed),
            "real" => Ok(VariantTag::Real),
            "double" => Ok(VariantTag::Double),
            "characterString" | "character_string" => Ok(VariantTag::String),
            other => Err(GatewayError::ValueConversion(format!(
                "unrecognized value variant '{other}'"
            ))),
        }
    }
}

impl TaggedValue {
    pub fn tag(&self) -> VariantTag {
        match self {
            TaggedValue::Null => VariantTag::Null,
            TaggedValue::Bool(_) => VariantTag::Bool,
            TaggedValue::Unsigned(_) => VariantTag::Unsigned,
            TaggedValue::Signed(_) => VariantTag::Signed,
            TaggedValue::Real(_) => VariantTag::Real,
            TaggedValue::Double(_) => VariantTag::Double,
            TaggedValue::String(_) => VariantTag::String,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TaggedValue::Null)
    }

    /// Render the JSON form.
    pub fn to_json(&self) -> Value {
        let payload = match self {
            TaggedValue::Null => Value::Bool(true),
            TaggedValue::Bool(b) => Value::Bool(*b),
            TaggedValue::Unsigned(u) => Value::String(u.to_string()),
            TaggedValue::Signed(i) => Value::String(i.to_string()),
            TaggedValue::Real(r) => float_to_json(f64::from(*r)),
            TaggedValue::Double(d) => float_to_json(*d),
            TaggedValue::String(s) => Value::String(s.clone()),
        };
        let mut map = Map::with_capacity(1);
        map.insert(self.tag().as_str().to_owned(), payload);
        Value::Object(map)
    }

    /// Parse the JSON form. Objects with zero or several keys are rejected.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| GatewayError::Decode(format!("tagged value must be an object: {value}")))?;
        let mut entries = object.iter();
        let (key, payload) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            (None, _) => {
                return Err(GatewayError::Decode(
                    "tagged value has no populated variant".into(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(GatewayError::Decode(format!(
                    "tagged value populates {} variants",
                    object.len()
                )))
            }
        };
        let tag: VariantTag = key
            .parse()
            .map_err(|_| GatewayError::Decode(format!("unknown tagged value variant '{key}'")))?;
        let mismatch = || GatewayError::Decode(format!("invalid payload for {tag}: {payload}"));
        match tag {
            VariantTag::Null => match payload {
                Value::Bool(true) | Value::Null => Ok(TaggedValue::Null),
                _ => Err(mismatch()),
            },
            VariantTag::Bool => payload.as_bool().map(TaggedValue::Bool).ok_or_else(mismatch),
            VariantTag::Unsigned => match payload {
                Value::Number(n) => n.as_u64().map(TaggedValue::Unsigned).ok_or_else(mismatch),
                Value::String(s) => s
                    .parse()
                    .map(TaggedValue::Unsigned)
                    .map_err(|_| mismatch()),
                _ => Err(mismatch()),
            },
            VariantTag::Signed => match payload {
                Value::Number(n) => n.as_i64().map(TaggedValue::Signed).ok_or_else(mismatch),
                Value::String(s) => s.parse().map(TaggedValue::Signed).map_err(|_| mismatch()),
                _ => Err(mismatch()),
            },
            VariantTag::Real => float_from_json(payload)
                .map(|f| TaggedValue::Real(f as f32))
                .ok_or_else(mismatch),
            VariantTag::Double => float_from_json(payload)
                .map(TaggedValue::Double)
                .ok_or_else(mismatch),
            VariantTag::String => payload
                .as_str()
                .map(|s| TaggedValue::String(s.to_owned()))
                .ok_or_else(mismatch),
        }
    }
}

fn float_to_json(value: f64) -> Value {
    match Number::from_f64(value) {
        Some(number) => Value::Number(number),
        None if value.is_nan() => Value::String("NaN".into()),
        None if value.is_sign_positive() => Value::String("Infinity".into()),
        None => Value::String("-Infinity".into()),
    }
}

fn float_from_json(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            other => other.parse().ok(),
        },
        _ => None,
    }
}

impl Serialize for TaggedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TaggedValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        TaggedValue::from_json(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_form_uses_single_camel_case_key() {
        assert_eq!(TaggedValue::Null.to_json(), json!({ "null": true }));
        assert_eq!(TaggedValue::Double(21.5).to_json(), json!({ "double": 21.5 }));
        assert_eq!(TaggedValue::Unsigned(7).to_json(), json!({ "unsigned": "7" }));
        assert_eq!(TaggedValue::Signed(-7).to_json(), json!({ "signed": "-7" }));
        assert_eq!(
            TaggedValue::String("occ".into()).to_json(),
            json!({ "characterString": "occ" })
        );
    }

    #[test]
    fn sixty_four_bit_integers_accept_numbers_and_strings() {
        let big = TaggedValue::from_json(&json!({ "unsigned": "18446744073709551615" })).unwrap();
        assert_eq!(big, TaggedValue::Unsigned(u64::MAX));
        let small = TaggedValue::from_json(&json!({ "signed": -3 })).unwrap();
        assert_eq!(small, TaggedValue::Signed(-3));
        assert!(TaggedValue::from_json(&json!({ "unsigned": -1 })).is_err());
    }

    #[test]
    fn non_finite_floats_use_string_spellings() {
        assert_eq!(
            TaggedValue::Double(f64::INFINITY).to_json(),
            json!({ "double": "Infinity" })
        );
        let parsed = TaggedValue::from_json(&json!({ "real": "NaN" })).unwrap();
        assert!(matches!(parsed, TaggedValue::Real(r) if r.is_nan()));
    }

    #[test]
    fn empty_or_ambiguous_objects_are_rejected() {
        let empty = TaggedValue::from_json(&json!({})).unwrap_err();
        assert!(matches!(empty, GatewayError::Decode(_)));
        let double = TaggedValue::from_json(&json!({ "real": 1.0, "boolean": true })).unwrap_err();
        assert!(matches!(double, GatewayError::Decode(_)));
        assert!(TaggedValue::from_json(&json!({ "octetString": "AA==" })).is_err());
        assert!(TaggedValue::from_json(&json!([1])).is_err());
    }

    #[test]
    fn serde_uses_json_form() {
        let text = serde_json::to_string(&TaggedValue::Bool(true)).unwrap();
        assert_eq!(text, r#"{"boolean":true}"#);
        let back: TaggedValue = serde_json::from_str(r#"{"character_string":"x"}"#).unwrap();
        assert_eq!(back, TaggedValue::String("x".into()));
    }

    #[test]
    fn variant_names_parse() {
        assert_eq!("real".parse::<VariantTag>().unwrap(), VariantTag::Real);
        let err = "bitString".parse::<VariantTag>().unwrap_err();
        assert!(matches!(err, GatewayError::ValueConversion(_)));
    }
}
