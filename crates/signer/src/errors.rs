//! Error types for capability signing

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("signer seed must be 32 bytes of hex")]
    InvalidSeed,

    #[error("verifying key is not a valid Ed25519 public key")]
    InvalidPublicKey,

    #[error("authorization signature does not match the signed fields")]
    InvalidSignature,

    #[error("authorization ttl must be greater than zero")]
    InvalidTtl,
}

pub type Result<T> = std::result::Result<T, SignerError>;
