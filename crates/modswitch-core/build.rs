//! Stamps the binaries with the commit, build time and cargo profile.

use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    let commit = git(&["describe", "--always", "--dirty", "--abbrev=7"])
        .unwrap_or_else(|| "unknown".to_string());
    let built_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs());
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=MODSWITCH_GIT_COMMIT={commit}");
    println!("cargo:rustc-env=MODSWITCH_BUILT_AT={built_at}");
    println!("cargo:rustc-env=MODSWITCH_BUILD_PROFILE={profile}");

    for path in ["../../.git/HEAD", "../../.git/refs"] {
        println!("cargo:rerun-if-changed={path}");
    }
}

/// Trimmed stdout of a successful `git` invocation.
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    Some(text.trim().to_string()).filter(|commit| !commit.is_empty())
}
