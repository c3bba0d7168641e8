use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=GIT_COMMIT_HASH");
    println!("cargo:rerun-if-changed=../../.git/HEAD");

    if let Ok(sha) = std::env::var("GIT_COMMIT_HASH") {
        let sha = sha.trim().to_string();
        if !sha.is_empty() {
            println!("cargo:rustc-env=GIT_COMMIT_HASH={sha}");
            return;
        }
    }

    // Best effort; builds outside a checkout simply omit the hash.
    if let Ok(output) = Command::new("git").args(["rev-parse", "HEAD"]).output() {
        if output.status.success() {
            let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !sha.is_empty() {
                println!("cargo:rustc-env=GIT_COMMIT_HASH={sha}");
            }
        }
    }
}
