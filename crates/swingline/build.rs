// Build script for swingline - embeds version at compile time

fn main() {
    // Release builds may pin the version from the environment
    let version =
        std::env::var("SWINGLINE_VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo:rustc-env=SWINGLINE_VERSION={}", version);

    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-env-changed=SWINGLINE_VERSION");
}
