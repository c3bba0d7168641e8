//! Shared types for the moniker allocation protocol.
//!
//! Account identifiers, generated labels, partitions, the word corpus,
//! domain records and the signed authorization token all live here so the
//! signer, the registry and the allocator agree on a single representation.

pub mod address;
pub mod authorization;
pub mod clock;
pub mod corpus;
pub mod label;
pub mod record;

pub use address::*;
pub use authorization::*;
pub use clock::*;
pub use corpus::*;
pub use label::*;
pub use record::*;
