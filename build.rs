fn main() -> Result<(), Box<dyn std::error::Error>> {
    // the gRPC code is only needed by the server and its client demos
    if std::env::var_os("CARGO_FEATURE_SERVER").is_some() {
        tonic_build::compile_protos("proto/letsmodel.proto")?;
    }
    Ok(())
}
