use std::env;

fn main() {
    // Cargo only tells build scripts which target is being built, so we hand it to the crate
    // ourselves. The platform resolver maps this triple onto the names used in release assets.
    println!(
        "cargo:rustc-env=TARGET={}",
        env::var("TARGET").unwrap_or_default()
    );
    // By default Cargo only runs the build script when a file changes. This makes it re-run on
    // target change.
    println!("cargo:rerun-if-changed-env=TARGET");
}
