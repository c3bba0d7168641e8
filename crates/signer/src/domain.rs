//! Structured, domain-separated registration message.
//!
//! The digest is built in three layers so a signature issued for one
//! registry deployment can never be replayed against another:
//!
//! * `domain_separator = H(DOMAIN_TYPE_HASH ‖ H(name) ‖ H(version) ‖ network_id ‖ target)`
//! * `struct_hash = H(REGISTRATION_TYPE_HASH ‖ owner ‖ H(partition) ‖ H(label) ‖ deadline ‖ nonce)`
//! * `digest = H(0x19 ‖ 0x01 ‖ domain_separator ‖ struct_hash)`
//!
//! where `H` is SHA-256 and integers are big-endian.

use moniker_types::{Address, Label, Nonce, Partition};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const DOMAIN_TYPE: &[u8] =
    b"SigningDomain(string name,string version,uint64 networkId,address verifyingTarget)";
const REGISTRATION_TYPE: &[u8] =
    b"Registration(address owner,string partition,string label,uint64 deadline,bytes32 nonce)";
const DIGEST_PREFIX: [u8; 2] = [0x19, 0x01];

pub const DEFAULT_DOMAIN_NAME: &str = "MonikerRegistry";
pub const DEFAULT_DOMAIN_VERSION: &str = "1.0.0";
pub const DEFAULT_NETWORK_ID: u64 = 10;

/// Envelope parameters shared by the signer and the verifying registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningDomain {
    pub name: String,
    pub version: String,
    pub network_id: u64,
    /// Address of the registry that is expected to redeem the capability.
    pub verifying_target: Address,
}

impl SigningDomain {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        network_id: u64,
        verifying_target: Address,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            network_id,
            verifying_target,
        }
    }

    /// Domain with the default name, version and network id.
    pub fn for_target(verifying_target: Address) -> Self {
        Self::new(
            DEFAULT_DOMAIN_NAME,
            DEFAULT_DOMAIN_VERSION,
            DEFAULT_NETWORK_ID,
            verifying_target,
        )
    }

    pub fn separator(&self) -> [u8; 32] {
        let mut h = Sha256::new();
        h.update(Sha256::digest(DOMAIN_TYPE));
        h.update(Sha256::digest(self.name.as_bytes()));
        h.update(Sha256::digest(self.version.as_bytes()));
        h.update(self.network_id.to_be_bytes());
        h.update(self.verifying_target.as_bytes());
        h.finalize().into()
    }
}

/// Typed fields covered by a registration signature.
#[derive(Debug, Clone, Copy)]
pub struct RegistrationClaims<'a> {
    pub owner: &'a Address,
    pub partition: &'a Partition,
    pub label: &'a Label,
    pub deadline: u64,
    pub nonce: &'a Nonce,
}

impl RegistrationClaims<'_> {
    pub fn struct_hash(&self) -> [u8; 32] {
        let mut h = Sha256::new();
        h.update(Sha256::digest(REGISTRATION_TYPE));
        h.update(self.owner.as_bytes());
        h.update(Sha256::digest(self.partition.as_str().as_bytes()));
        h.update(Sha256::digest(self.label.as_str().as_bytes()));
        h.update(self.deadline.to_be_bytes());
        h.update(self.nonce.as_bytes());
        h.finalize().into()
    }
}

/// Digest that is actually signed.
pub fn registration_digest(domain: &SigningDomain, claims: &RegistrationClaims<'_>) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(DIGEST_PREFIX);
    h.update(domain.separator());
    h.update(claims.struct_hash());
    h.finalize().into()
}
