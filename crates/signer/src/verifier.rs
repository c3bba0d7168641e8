use crate::domain::{registration_digest, RegistrationClaims, SigningDomain};
use crate::errors::*;
use ed25519_dalek::{Signature, VerifyingKey};
use moniker_types::{Address, Authorization, Label, Nonce, Partition, SignatureBytes};

/// Registry-side check that a capability was endorsed by the trusted signer.
#[derive(Debug, Clone)]
pub struct CapabilityVerifier {
    key: VerifyingKey,
    domain: SigningDomain,
}

impl CapabilityVerifier {
    pub fn new(key: VerifyingKey, domain: SigningDomain) -> Self {
        Self { key, domain }
    }

    /// Build a verifier from a hex-encoded 32-byte public key.
    pub fn from_public_key_hex(public_key: &str, domain: SigningDomain) -> Result<Self> {
        let trimmed = public_key.trim();
        let payload = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(payload, &mut bytes).map_err(|_| SignerError::InvalidPublicKey)?;
        let key = VerifyingKey::from_bytes(&bytes).map_err(|_| SignerError::InvalidPublicKey)?;
        Ok(Self::new(key, domain))
    }

    pub fn domain(&self) -> &SigningDomain {
        &self.domain
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.key.to_bytes())
    }

    /// Verify a signature over exactly these fields.
    pub fn verify(
        &self,
        owner: &Address,
        partition: &Partition,
        label: &Label,
        deadline: u64,
        nonce: &Nonce,
        signature: &SignatureBytes,
    ) -> Result<()> {
        let claims = RegistrationClaims {
            owner,
            partition,
            label,
            deadline,
            nonce,
        };
        let digest = registration_digest(&self.domain, &claims);
        let signature = Signature::from_bytes(signature.as_bytes());
        self.key
            .verify_strict(&digest, &signature)
            .map_err(|_| SignerError::InvalidSignature)
    }

    /// Verify an authorization against the fields it carries.
    pub fn verify_authorization(&self, auth: &Authorization) -> Result<()> {
        self.verify(
            &auth.owner,
            &auth.partition,
            &auth.label,
            auth.deadline,
            &auth.nonce,
            &auth.signature,
        )
    }
}
