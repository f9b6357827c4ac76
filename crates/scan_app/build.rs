use std::env;

fn main() {
    let version = env::var("MRI_SCAN_VERSION")
        .or_else(|_| env::var("CARGO_PKG_VERSION"))
        .unwrap_or_else(|_| "0.0.0".to_string());
    println!("cargo:rerun-if-env-changed=MRI_SCAN_VERSION");
    println!("cargo:rustc-env=MRI_SCAN_VERSION={version}");
}
