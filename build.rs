//! Build script for stereo-vision-core
//!
//! Generates the gRPC/protobuf bindings for the vision service during
//! `cargo build`.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .type_attribute(".", "#[allow(missing_docs)]")
        .compile(&["proto/vision.proto"], &["proto"])?;

    Ok(())
}
