fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/price_optimizer.proto");

    // The generated gRPC code is only used by the `server` feature.
    if std::env::var_os("CARGO_FEATURE_SERVER").is_some() {
        tonic_build::compile_protos("proto/price_optimizer.proto")?;
    }

    Ok(())
}
