//! Registration registry for generated names.
//!
//! The registry is the single authority over which `(label, partition)`
//! pairs exist and who owns them. It verifies signed capabilities issued by
//! the allocator, enforces the per-account quota, consumes nonces exactly
//! once, collects registration fees and handles ownership transfers. All
//! mutations are linearised behind one lock and written through a
//! [`RegistryStore`] before they become observable.

pub mod config;
pub mod entropy;
pub mod errors;
pub mod registry;
pub mod store;

pub use config::*;
pub use entropy::*;
pub use errors::*;
pub use registry::{Registry, Withdrawal};
pub use store::*;
