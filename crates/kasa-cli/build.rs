//! Stamps `KASA_VERSION` for `kasa --version`.
//!
//! Packagers may set `KASA_BUILD_VERSION`; otherwise the crate version is
//! suffixed with the short commit hash when building from a checkout.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=KASA_BUILD_VERSION");
    println!("cargo:rerun-if-changed=.git/HEAD");

    let version = env::var("KASA_BUILD_VERSION")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| {
            let base = env!("CARGO_PKG_VERSION");
            match commit_hash() {
                Some(hash) => format!("{}+{}", base, hash),
                None => base.to_string(),
            }
        });

    println!("cargo:rustc-env=KASA_VERSION={}", version);
}

fn commit_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=9", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())?;

    let hash = String::from_utf8(output.stdout).ok()?;
    let hash = hash.trim();
    (!hash.is_empty()).then(|| hash.to_string())
}
