fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Compile the Terraform plugin protocol subset
    tonic_build::configure()
        .build_server(true)
        .build_client(false)
        .compile_protos(&["proto/tfplugin6.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/tfplugin6.proto");

    Ok(())
}
