pub const MONIKER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commit the binary was built from, as embedded by `moniker-rpc`'s build script.
pub fn git_commit_hash() -> &'static str {
    moniker_rpc::GIT_COMMIT_HASH.unwrap_or("unknown")
}
