fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/echo.proto");

    // Vendored protoc; no system install required.
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path().unwrap());

    let out_dir = std::path::PathBuf::from(std::env::var("OUT_DIR")?);

    tonic_build::configure()
        .file_descriptor_set_path(out_dir.join("echo_descriptor.bin"))
        .build_client(true)
        .build_server(true)
        .compile(&["proto/echo.proto"], &["proto"])?;

    Ok(())
}
