use std::process::Command;

/// Trimmed stdout of a git command, or `None` outside a checkout.
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn main() {
    let commit = git(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".into());
    let branch = git(&["branch", "--show-current"]).unwrap_or_else(|| "detached".into());

    println!("cargo:rustc-env=PORTUP_GIT_COMMIT={}", commit);
    println!("cargo:rustc-env=PORTUP_GIT_BRANCH={}", branch);

    // A tagged HEAD is a release build
    if let Some(tag) = git(&["tag", "--points-at", "HEAD"]).and_then(|tags| {
        tags.lines().next().map(str::to_string)
    }) {
        println!("cargo:rustc-env=PORTUP_GIT_TAG={}", tag);
    }

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");
}
