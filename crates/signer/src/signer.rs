//! Issuance of signed, expiring registration capabilities.
//!
//! The signing key never leaves this type: it is not serialisable, its
//! `Debug` output only shows the public half, and no error message carries
//! key bytes.

use crate::domain::{registration_digest, RegistrationClaims, SigningDomain};
use crate::errors::*;
use crate::verifier::CapabilityVerifier;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use moniker_types::{
    Address, Authorization, Clock, DomainKey, Nonce, SignatureBytes, SystemClock, NONCE_BYTES,
};
use rand_core::{OsRng, RngCore};
use std::fmt;
use std::sync::Arc;

/// Lifetime of an issued authorization.
pub const DEFAULT_AUTHORIZATION_TTL_SECS: u64 = 3_600;

/// Server-side capability signer.
///
/// `issue` takes `&self` and draws nonces straight from the OS CSPRNG, so
/// concurrent callers never share mutable state and never need a lock.
pub struct CapabilitySigner {
    signing_key: SigningKey,
    domain: SigningDomain,
    ttl_secs: u64,
    clock: Arc<dyn Clock>,
}

impl CapabilitySigner {
    /// Create a signer from a raw 32-byte Ed25519 seed.
    pub fn new(seed: [u8; 32], domain: SigningDomain) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
            domain,
            ttl_secs: DEFAULT_AUTHORIZATION_TTL_SECS,
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a signer from a hex-encoded seed (optionally `0x`-prefixed).
    pub fn from_seed_hex(seed_hex: &str, domain: SigningDomain) -> Result<Self> {
        let trimmed = seed_hex.trim();
        let payload = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let mut seed = [0u8; 32];
        hex::decode_to_slice(payload, &mut seed).map_err(|_| SignerError::InvalidSeed)?;
        let signer = Self::new(seed, domain);
        seed.fill(0);
        Ok(signer)
    }

    /// Generate a signer with a fresh random key.
    pub fn generate(domain: SigningDomain) -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        let signer = Self::new(seed, domain);
        seed.fill(0);
        signer
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Result<Self> {
        if ttl_secs == 0 {
            return Err(SignerError::InvalidTtl);
        }
        self.ttl_secs = ttl_secs;
        Ok(self)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Verifier trusting this signer, for the registry side.
    pub fn verifier(&self) -> CapabilityVerifier {
        CapabilityVerifier::new(self.verifying_key(), self.domain.clone())
    }

    pub fn domain(&self) -> &SigningDomain {
        &self.domain
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Issue a capability for `owner` to register `key`, valid for the TTL.
    pub fn issue(&self, owner: &Address, key: &DomainKey) -> Authorization {
        let mut nonce = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut nonce);
        let deadline = self.clock.now_secs().saturating_add(self.ttl_secs);
        self.sign_with(owner, key, deadline, Nonce(nonce))
    }

    /// Sign an explicit `(owner, key, deadline, nonce)` tuple.
    pub fn sign_with(
        &self,
        owner: &Address,
        key: &DomainKey,
        deadline: u64,
        nonce: Nonce,
    ) -> Authorization {
        let claims = RegistrationClaims {
            owner,
            partition: &key.partition,
            label: &key.label,
            deadline,
            nonce: &nonce,
        };
        let digest = registration_digest(&self.domain, &claims);
        let signature = self.signing_key.sign(&digest);

        Authorization {
            partition: key.partition.clone(),
            label: key.label.clone(),
            owner: *owner,
            deadline,
            nonce,
            signature: SignatureBytes(signature.to_bytes()),
        }
    }
}

impl fmt::Debug for CapabilitySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilitySigner")
            .field("public_key", &hex::encode(self.verifying_key().to_bytes()))
            .field("domain", &self.domain)
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moniker_types::{Label, ManualClock, Partition};
    use std::collections::HashSet;

    fn key() -> DomainKey {
        DomainKey::new(
            Partition::new("OP").unwrap(),
            Label::parse("swift-noble-dragon").unwrap(),
        )
    }

    #[test]
    fn issue_sets_deadline_from_clock_and_ttl() {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let signer = CapabilitySigner::new([42u8; 32], SigningDomain::for_target(Address([5u8; 20])))
            .with_clock(clock);
        let owner = Address([1u8; 20]);

        let auth = signer.issue(&owner, &key());
        assert_eq!(auth.deadline, 1_700_000_000 + DEFAULT_AUTHORIZATION_TTL_SECS);
        assert_eq!(auth.owner, owner);
        assert_eq!(auth.key(), key());
    }

    #[test]
    fn nonces_do_not_repeat() {
        let signer = CapabilitySigner::generate(SigningDomain::for_target(Address([5u8; 20])));
        let owner = Address([1u8; 20]);
        let nonces: HashSet<_> = (0..256).map(|_| signer.issue(&owner, &key()).nonce).collect();
        assert_eq!(nonces.len(), 256);
    }

    #[test]
    fn seed_hex_parsing() {
        let domain = SigningDomain::for_target(Address([5u8; 20]));
        let from_hex = CapabilitySigner::from_seed_hex(&format!("0x{}", "2a".repeat(32)), domain.clone())
            .unwrap();
        let direct = CapabilitySigner::new([42u8; 32], domain.clone());
        assert_eq!(from_hex.verifying_key(), direct.verifying_key());

        assert_eq!(
            CapabilitySigner::from_seed_hex("abcd", domain.clone()).unwrap_err(),
            SignerError::InvalidSeed
        );
        assert_eq!(
            CapabilitySigner::new([1u8; 32], domain).with_ttl(0).unwrap_err(),
            SignerError::InvalidTtl
        );
    }

    #[test]
    fn debug_output_hides_secret_key() {
        let signer = CapabilitySigner::new([42u8; 32], SigningDomain::for_target(Address([5u8; 20])));
        let rendered = format!("{signer:?}");
        assert!(!rendered.contains(&hex::encode([42u8; 32])));
        assert!(rendered.contains(&hex::encode(signer.verifying_key().to_bytes())));
    }
}
