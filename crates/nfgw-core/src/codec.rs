//! ---
//! gw_section: "01-core-functionality"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Catalog synchronization and command translation core."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
//! Conversion between host-native scalars and [`TaggedValue`].
//!
//! Native values are `serde_json::Value`s, the representation hosts hand to
//! the interface. Encoding always follows the variant a point declares; the
//! shape of the caller's value never picks the variant.

use serde_json::{Number, Value};

use crate::error::{GatewayError, Result};
use crate::value::{TaggedValue, VariantTag};

/// Stateless codec between native values and tagged device values.
#[derive(Debug, Default, Clone, Copy)]
pub struct ValueCodec;

impl ValueCodec {
    /// Decode the populated variant of a wire value.
    ///
    /// `None` stands for a wire value with no variant populated, which is
    /// invalid input rather than an implicit null.
    pub fn decode(value: Option<&TaggedValue>) -> Result<Value> {
        let value = value.ok_or_else(|| {
            GatewayError::Decode("device value has no populated variant".into())
        })?;
        Ok(match value {
            TaggedValue::Null => Value::Null,
            TaggedValue::Bool(b) => Value::Bool(*b),
            TaggedValue::Unsigned(u) => Value::from(*u),
            TaggedValue::Signed(i) => Value::from(*i),
            TaggedValue::Real(r) => finite_number(f64::from(*r))?,
            TaggedValue::Double(d) => finite_number(*d)?,
            TaggedValue::String(s) => Value::String(s.clone()),
        })
    }

    /// Encode `value` as the `target` variant. A null value always encodes as
    /// [`TaggedValue::Null`], whatever the target.
    pub fn encode(target: VariantTag, value: &Value) -> Result<TaggedValue> {
        if value.is_null() {
            return Ok(TaggedValue::Null);
        }
        if matches!(value, Value::Array(_) | Value::Object(_)) {
            return Err(conversion(target, value, "only scalar values can be written"));
        }
        match target {
            VariantTag::Null => Err(conversion(
                target,
                value,
                "point declares no writable value type",
            )),
            VariantTag::Bool => to_bool(value)
                .map(TaggedValue::Bool)
                .ok_or_else(|| conversion(target, value, "not a boolean")),
            VariantTag::Unsigned => to_u64(value).map(TaggedValue::Unsigned),
            VariantTag::Signed => to_i64(value).map(TaggedValue::Signed),
            VariantTag::Real => {
                let f = to_f64(target, value)?;
                if f.abs() > f64::from(f32::MAX) {
                    return Err(conversion(target, value, "out of range for a real"));
                }
                Ok(TaggedValue::Real(f as f32))
            }
            VariantTag::Double => to_f64(target, value).map(TaggedValue::Double),
            VariantTag::String => Ok(TaggedValue::String(match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })),
        }
    }
}

fn conversion(target: VariantTag, value: &Value, reason: &str) -> GatewayError {
    GatewayError::ValueConversion(format!("cannot encode {value} as {target}: {reason}"))
}

fn finite_number(f: f64) -> Result<Value> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| GatewayError::Decode(format!("non-finite device value {f}")))
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "on" | "active" => Some(true),
            "false" | "0" | "off" | "inactive" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Integral value of a whole float, `None` for fractions and non-finite input.
fn whole(f: f64) -> Option<f64> {
    (f.is_finite() && f.fract() == 0.0).then_some(f)
}

fn to_u64(value: &Value) -> Result<u64> {
    let target = VariantTag::Unsigned;
    match value {
        Value::Bool(b) => Ok(u64::from(*b)),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return Ok(u);
            }
            if n.as_i64().is_some() {
                return Err(conversion(target, value, "negative value"));
            }
            n.as_f64()
                .and_then(whole)
                .filter(|f| *f >= 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
                .ok_or_else(|| conversion(target, value, "not a whole non-negative number"))
        }
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|err| conversion(target, value, &format!("{err}"))),
        _ => Err(conversion(target, value, "not numeric")),
    }
}

fn to_i64(value: &Value) -> Result<i64> {
    let target = VariantTag::Signed;
    match value {
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            if n.as_u64().is_some() {
                return Err(conversion(target, value, "out of range for a signed integer"));
            }
            n.as_f64()
                .and_then(whole)
                .filter(|f| *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
                .ok_or_else(|| conversion(target, value, "not a whole number"))
        }
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|err| conversion(target, value, &format!("{err}"))),
        _ => Err(conversion(target, value, "not numeric")),
    }
}

fn to_f64(target: VariantTag, value: &Value) -> Result<f64> {
    let f = match value {
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| conversion(target, value, "not representable as a float"))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|err| conversion(target, value, &format!("{err}")))?,
        _ => return Err(conversion(target, value, "not numeric")),
    };
    if !f.is_finite() {
        return Err(conversion(target, value, "non-finite value"));
    }
    Ok(f)
}
