//! Off-chain allocation of human-memorable names.
//!
//! The allocator proposes random `adjective-descriptor-noun` labels, probes
//! the registry for a free one within a bounded number of attempts and asks
//! the capability signer for a time-limited authorization. It never writes
//! to the registry; the client redeems the returned grant separately.

pub mod errors;
pub mod generator;
pub mod policy;
pub mod probe;
pub mod service;

pub use errors::*;
pub use generator::{LabelGenerator, OsRandom, RandomSource, SequenceRandom};
pub use policy::{RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_PROBE_TIMEOUT};
pub use probe::{AvailabilityProber, LocalRegistryReader, RegistryDescriptor, RegistryReader};
pub use service::{AccountStatus, AllocationGrant, AllocationService};
