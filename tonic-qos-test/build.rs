use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto");
    println!("cargo:rerun-if-env-changed=PROTOC");

    // Use a system protoc when one is configured, otherwise download one.
    if std::env::var_os("PROTOC").is_none() {
        let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);
        let protoc = protoc_fetcher::protoc("31.1", &out_dir)
            .map_err(|e| std::io::Error::other(format!("failed to fetch protoc: {e}")))?;
        // SAFETY: build scripts run single-threaded.
        unsafe {
            std::env::set_var("PROTOC", protoc);
        }
    }

    tonic_prost_build::configure()
        .build_client(false)
        .compile_protos(&["proto/sample.proto"], &["proto"])?;

    Ok(())
}
