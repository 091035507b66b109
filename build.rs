fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 使用 vendored protoc，避免依賴系統安裝
    if std::env::var_os("PROTOC").is_none() {
        let protoc = protoc_bin_vendored::protoc_bin_path().map_err(|e| e.to_string())?;
        std::env::set_var("PROTOC", protoc);
    }

    println!("cargo:rerun-if-changed=proto/box_ev.proto");
    tonic_build::compile_protos("proto/box_ev.proto")?;
    Ok(())
}
