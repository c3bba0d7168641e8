//! Signed, expiring, single-use registration capability.

use crate::address::Address;
use crate::label::{DomainKey, Label, Partition};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Width of an authorization nonce in bytes.
pub const NONCE_BYTES: usize = 32;
/// Width of an Ed25519 signature in bytes.
pub const SIGNATURE_BYTES: usize = 64;

/// Errors raised when decoding hex-encoded fixed-width values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexFieldError {
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("value is not valid hexadecimal")]
    InvalidHex,
}

fn decode_fixed<const N: usize>(value: &str) -> Result<[u8; N], HexFieldError> {
    let payload = value
        .trim()
        .strip_prefix("0x")
        .unwrap_or_else(|| value.trim());
    if payload.len() != N * 2 {
        return Err(HexFieldError::InvalidLength {
            expected: N,
            actual: payload.len() / 2,
        });
    }
    let mut bytes = [0u8; N];
    hex::decode_to_slice(payload, &mut bytes).map_err(|_| HexFieldError::InvalidHex)?;
    Ok(bytes)
}

/// Random single-use value binding an authorization.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nonce(pub [u8; NONCE_BYTES]);

impl Nonce {
    pub fn from_hex(value: &str) -> Result<Self, HexFieldError> {
        decode_fixed::<NONCE_BYTES>(value).map(Nonce)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_BYTES] {
        &self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", self.to_hex())
    }
}

impl From<Nonce> for String {
    fn from(value: Nonce) -> Self {
        value.to_hex()
    }
}

impl TryFrom<String> for Nonce {
    type Error = HexFieldError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Nonce::from_hex(&value)
    }
}

/// Raw Ed25519 signature bytes.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SignatureBytes(pub [u8; SIGNATURE_BYTES]);

impl SignatureBytes {
    pub fn from_hex(value: &str) -> Result<Self, HexFieldError> {
        decode_fixed::<SIGNATURE_BYTES>(value).map(SignatureBytes)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_BYTES] {
        &self.0
    }
}

impl fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureBytes({})", self.to_hex())
    }
}

impl From<SignatureBytes> for String {
    fn from(value: SignatureBytes) -> Self {
        value.to_hex()
    }
}

impl TryFrom<String> for SignatureBytes {
    type Error = HexFieldError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SignatureBytes::from_hex(&value)
    }
}

/// Capability token issued by the signer and redeemed once at the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    pub partition: Partition,
    pub label: Label,
    pub owner: Address,
    /// Absolute expiry in seconds since UNIX_EPOCH.
    pub deadline: u64,
    pub nonce: Nonce,
    pub signature: SignatureBytes,
}

impl Authorization {
    pub fn key(&self) -> DomainKey {
        DomainKey::new(self.partition.clone(), self.label.clone())
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        now > self.deadline
    }
}
