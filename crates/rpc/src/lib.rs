//! HTTP API for the moniker node.
//!
//! Exposes the Allocate and Status operations used by front ends, plus
//! read and submit access to the registry.

mod server;

pub use server::{build_router, start_server, AppState, GIT_COMMIT_HASH};
