//! Capability signer for moniker registrations.
//!
//! The allocator endorses one `(owner, partition, label, deadline, nonce)`
//! tuple by signing a domain-separated digest with a server-held Ed25519 key.
//! The registry recomputes the same digest and checks it against the
//! trusted verifying key before committing anything.

pub mod domain;
pub mod errors;
pub mod signer;
pub mod verifier;

pub use domain::{
    registration_digest, RegistrationClaims, SigningDomain, DEFAULT_DOMAIN_NAME,
    DEFAULT_DOMAIN_VERSION, DEFAULT_NETWORK_ID,
};
pub use errors::*;
pub use signer::{CapabilitySigner, DEFAULT_AUTHORIZATION_TTL_SECS};
pub use verifier::CapabilityVerifier;
