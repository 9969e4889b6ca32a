// SPDX-License-Identifier: MPL-2.0

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=CAMERA_SESSION_VERSION");

    // Packagers may pin the version explicitly
    let version = std::env::var("CAMERA_SESSION_VERSION").unwrap_or_else(|_| git_version());
    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// `0.1.18-abcdef1` at a tag, `0.1.18-dirty-abcdef1` past it, otherwise the
/// package version with the commit hash (or `unknown`)
fn git_version() -> String {
    let hash = git(&["rev-parse", "--short", "HEAD"]);
    let Some(described) = git(&["describe", "--tags", "--match", "v*"]) else {
        let fallback = env!("CARGO_PKG_VERSION");
        return match hash {
            Some(hash) => format!("{}-{}", fallback, hash),
            None => format!("{}-unknown", fallback),
        };
    };
    let described = described.strip_prefix('v').unwrap_or(&described);

    // git describe past a tag: <tag>-<commits>-g<hash>
    let parts: Vec<&str> = described.rsplitn(3, '-').collect();
    if let [g_hash, _commits, base] = parts.as_slice() {
        let short = g_hash.strip_prefix('g').unwrap_or(g_hash);
        return format!("{}-dirty-{}", base, short);
    }
    format!(
        "{}-{}",
        described,
        hash.unwrap_or_else(|| "unknown".to_string())
    )
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
