use moniker_signer::{CapabilitySigner, CapabilityVerifier, SignerError, SigningDomain};
use moniker_types::{Address, DomainKey, Label, Nonce, Partition};

const DETERMINISTIC_SEED: [u8; 32] = [42u8; 32];

fn registry_address() -> Address {
    Address([0xAA; 20])
}

fn signer() -> CapabilitySigner {
    CapabilitySigner::new(DETERMINISTIC_SEED, SigningDomain::for_target(registry_address()))
}

fn key() -> DomainKey {
    DomainKey::new(
        Partition::new("OP").unwrap(),
        Label::parse("swift-noble-dragon").unwrap(),
    )
}

#[test]
fn issued_authorization_verifies() {
    let signer = signer();
    let auth = signer.issue(&Address([1u8; 20]), &key());
    assert!(signer.verifier().verify_authorization(&auth).is_ok());
}

#[test]
fn tampered_owner_is_rejected() {
    let signer = signer();
    let mut auth = signer.issue(&Address([1u8; 20]), &key());
    auth.owner = Address([2u8; 20]);
    assert_eq!(
        signer.verifier().verify_authorization(&auth),
        Err(SignerError::InvalidSignature)
    );
}

#[test]
fn tampered_deadline_is_rejected() {
    let signer = signer();
    let mut auth = signer.issue(&Address([1u8; 20]), &key());
    auth.deadline += 1;
    assert_eq!(
        signer.verifier().verify_authorization(&auth),
        Err(SignerError::InvalidSignature)
    );
}

#[test]
fn tampered_nonce_is_rejected() {
    let signer = signer();
    let mut auth = signer.issue(&Address([1u8; 20]), &key());
    auth.nonce.0[0] ^= 0xFF;
    assert_eq!(
        signer.verifier().verify_authorization(&auth),
        Err(SignerError::InvalidSignature)
    );
}

#[test]
fn tampered_label_is_rejected() {
    let signer = signer();
    let mut auth = signer.issue(&Address([1u8; 20]), &key());
    auth.label = Label::parse("brave-noble-dragon").unwrap();
    assert_eq!(
        signer.verifier().verify_authorization(&auth),
        Err(SignerError::InvalidSignature)
    );
}

#[test]
fn tampered_signature_is_rejected() {
    let signer = signer();
    let mut auth = signer.issue(&Address([1u8; 20]), &key());
    auth.signature.0[0] ^= 0xFF;
    assert!(signer.verifier().verify_authorization(&auth).is_err());
}

#[test]
fn signature_from_untrusted_key_is_rejected() {
    let trusted = signer();
    let rogue = CapabilitySigner::new([7u8; 32], SigningDomain::for_target(registry_address()));
    let auth = rogue.issue(&Address([1u8; 20]), &key());
    assert_eq!(
        trusted.verifier().verify_authorization(&auth),
        Err(SignerError::InvalidSignature)
    );
}

#[test]
fn signature_for_another_registry_is_rejected() {
    let ours = signer();
    let theirs = CapabilitySigner::new(
        DETERMINISTIC_SEED,
        SigningDomain::for_target(Address([0xBB; 20])),
    );
    let auth = theirs.issue(&Address([1u8; 20]), &key());
    assert!(ours.verifier().verify_authorization(&auth).is_err());
}

#[test]
fn deterministic_signing_is_reproducible() {
    let owner = Address([1u8; 20]);
    let nonce = Nonce([3u8; 32]);
    let first = signer().sign_with(&owner, &key(), 1_000, nonce);
    let second = signer().sign_with(&owner, &key(), 1_000, nonce);
    assert_eq!(first.signature, second.signature);
}

#[test]
fn verifier_from_public_key_hex() {
    let signer = signer();
    let verifier = CapabilityVerifier::from_public_key_hex(
        &hex::encode(signer.verifying_key().to_bytes()),
        signer.domain().clone(),
    )
    .unwrap();
    let auth = signer.issue(&Address([1u8; 20]), &key());
    assert!(verifier.verify_authorization(&auth).is_ok());

    assert_eq!(
        CapabilityVerifier::from_public_key_hex("zz", signer.domain().clone()).unwrap_err(),
        SignerError::InvalidPublicKey
    );
}

#[test]
fn authorization_survives_json_transport() {
    let signer = signer();
    let auth = signer.issue(&Address([1u8; 20]), &key());
    let json = serde_json::to_string(&auth).unwrap();
    let decoded = serde_json::from_str(&json).unwrap();
    assert!(signer.verifier().verify_authorization(&decoded).is_ok());
}
