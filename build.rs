fn main() {
    let version = get_version();
    println!("cargo:rustc-env=ATLAS_SERVE_VERSION={}", version);
    println!("cargo:rerun-if-env-changed=ATLAS_SERVE_RELEASE_VERSION");

    // Declare dev_build as a valid cfg so the compiler doesn't warn about it.
    println!("cargo:rustc-check-cfg=cfg(dev_build)");

    if version.contains("-dev") {
        println!("cargo:rustc-cfg=dev_build");
    }
}

fn get_version() -> String {
    // Release workflow sets the tag without its `v` prefix.
    if let Ok(release_version) = std::env::var("ATLAS_SERVE_RELEASE_VERSION") {
        return release_version.trim_start_matches('v').to_string();
    }

    env!("CARGO_PKG_VERSION").to_string()
}
