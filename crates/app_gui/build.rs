use std::env;

fn main() {
    let version = env::var("DANDELION_VERSION")
        .or_else(|_| env::var("CARGO_PKG_VERSION"))
        .unwrap_or_else(|_| "dev".to_string());
    println!("cargo:rerun-if-env-changed=DANDELION_VERSION");
    println!("cargo:rustc-env=DANDELION_VERSION={version}");
}
