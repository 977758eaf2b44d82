//! ---
//! gw_section: "01-core-functionality"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Catalog synchronization and command translation core."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};

use crate::error::{GatewayError, Result};
use crate::value::{TaggedValue, VariantTag};

/// Attribute holding the engineering units of a point.
pub const UNITS_ATTR: &str = "prop_units";

/// BACnet object identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectId {
    pub object_type: u32,
    pub instance: u32,
}

/// Object, property, and optional array index addressed on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyReference {
    pub object_id: ObjectId,
    pub property_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_index: Option<u32>,
}

/// Decoded BACnet binding of a catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PointBinding {
    pub device_address: String,
    pub property: Option<PropertyReference>,
    /// `None` when the wire value had no variant populated.
    pub example_value: Option<TaggedValue>,
}

/// Protocol-specific part of a catalog entry as received from the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolBinding {
    Bacnet(PointBinding),
    /// A binding the backend could not decode, e.g. a foreign message type.
    Undecodable { type_url: String, reason: String },
}

/// One catalog entry as listed by the remote catalog.
///
/// Serializing an entry yields the human-readable snapshot stored as a
/// register description; the protocol binding is never part of it.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub uuid: String,
    pub layer: String,
    pub attrs: BTreeMap<String, String>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Duration>,
    #[serde(skip)]
    pub binding: Option<ProtocolBinding>,
}

/// Immutable decoded representation of one catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PointDescriptor {
    pub uuid: String,
    pub layer: String,
    pub attrs: BTreeMap<String, String>,
    pub device_address: String,
    pub property: PropertyReference,
    /// Populated variant defines the point's wire type.
    pub example_value: TaggedValue,
    pub units: String,
    /// JSON snapshot of the catalog entry without its protocol binding.
    pub snapshot: String,
}

impl PointDescriptor {
    pub fn from_entry(mut entry: CatalogEntry) -> Result<Self> {
        if entry.uuid.trim().is_empty() {
            return Err(GatewayError::Decode("catalog entry without uuid".into()));
        }
        let binding = match entry.binding.take() {
            Some(ProtocolBinding::Bacnet(binding)) => binding,
            Some(ProtocolBinding::Undecodable { type_url, reason }) => {
                return Err(GatewayError::Decode(format!(
                    "point {}: undecodable binding {type_url}: {reason}",
                    entry.uuid
                )))
            }
            None => {
                return Err(GatewayError::Decode(format!(
                    "point {}: no protocol binding",
                    entry.uuid
                )))
            }
        };
        let property = binding.property.ok_or_else(|| {
            GatewayError::Decode(format!("point {}: no property reference", entry.uuid))
        })?;
        let example_value = binding.example_value.ok_or_else(|| {
            GatewayError::Decode(format!("point {}: no example value", entry.uuid))
        })?;
        let snapshot = serde_json::to_string(&entry)?;
        let units = entry.attrs.get(UNITS_ATTR).cloned().unwrap_or_default();
        Ok(Self {
            uuid: entry.uuid,
            layer: entry.layer,
            attrs: entry.attrs,
            device_address: binding.device_address,
            property,
            example_value,
            units,
            snapshot,
        })
    }

    /// Wire type declared by the point's example value.
    pub fn variant(&self) -> VariantTag {
        self.example_value.tag()
    }

    /// Attributes offered to name templates: the metadata plus `uuid`.
    pub fn name_attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = self.attrs.clone();
        attrs.insert("uuid".to_owned(), self.uuid.clone());
        attrs
    }
}

/// Host-visible named wrapper around a descriptor. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Register {
    name: String,
    descriptor: Arc<PointDescriptor>,
}

impl Register {
    pub fn new(name: impl Into<String>, descriptor: PointDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor: Arc::new(descriptor),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.descriptor.snapshot
    }

    pub fn units(&self) -> &str {
        &self.descriptor.units
    }

    pub fn descriptor(&self) -> &PointDescriptor {
        &self.descriptor
    }
}
