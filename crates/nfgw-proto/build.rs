//! ---
//! gw_section: "02-wire-schemas"
//! gw_subsection: "build"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Compiles the point manager and BACnet service schemas."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
fn main() {
    let protoc = protoc_bin_vendored::protoc_bin_path().expect("failed to locate protoc");
    std::env::set_var("PROTOC", protoc);
    let well_known =
        protoc_bin_vendored::include_path().expect("failed to locate protobuf well-known types");

    println!("cargo:rerun-if-changed=proto");

    tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .compile(
            &[
                "proto/normalgw/hpl/v1/point.proto",
                "proto/normalgw/bacnet/v1/bacnet.proto",
            ],
            &[std::path::PathBuf::from("proto"), well_known],
        )
        .expect("failed to compile gateway protobufs");
}
