//! ---
//! gw_section: "02-wire-schemas"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Generated point manager and BACnet service schemas."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
//! Re-exports the generated protobuf modules so the rest of the workspace
//! depends on one stable path for the structured RPC wire form.

pub mod normalgw {
    pub mod hpl {
        pub mod v1 {
            tonic::include_proto!("normalgw.hpl.v1");
        }
    }

    pub mod bacnet {
        pub mod v1 {
            tonic::include_proto!("normalgw.bacnet.v1");
        }
    }
}

pub use normalgw::bacnet::v1 as bacnet;
pub use normalgw::hpl::v1 as hpl;

/// Type URL under which a [`bacnet::BacnetPoint`] is packed into `Point.hpldata`.
pub const BACNET_POINT_TYPE_URL: &str = "type.googleapis.com/normalgw.bacnet.v1.BacnetPoint";

/// Message names accepted as a BACnet point binding. Older gateway releases
/// pack the unversioned `normalgw.bacnet.BACnetPoint`.
pub const BACNET_POINT_TYPE_NAMES: &[&str] =
    &["normalgw.bacnet.v1.BacnetPoint", "normalgw.bacnet.BACnetPoint"];

/// Whether `type_url` names a BACnet point binding. Only the part after the
/// last `/` is compared, so the URL host prefix does not matter.
pub fn is_bacnet_point_type(type_url: &str) -> bool {
    let name = type_url.rsplit('/').next().unwrap_or(type_url);
    BACNET_POINT_TYPE_NAMES.contains(&name)
}
