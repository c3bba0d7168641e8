use moniker_registry::{
    PersistedState, Registry, RegistryConfig, RegistryError, RegistryStore, SequenceEntropy,
    SledRegistryStore, StoreError, StoreWrite,
};
use moniker_signer::{CapabilitySigner, SigningDomain};
use moniker_types::{Address, DomainKey, Label, Partition, WordCorpus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn config() -> RegistryConfig {
    RegistryConfig::new(Address([0xEE; 20]), Address([0xAD; 20]))
}

fn signer() -> CapabilitySigner {
    CapabilitySigner::new([42u8; 32], SigningDomain::for_target(config().address))
}

fn key(label: &str) -> DomainKey {
    DomainKey::new(Partition::new("Base").unwrap(), Label::parse(label).unwrap())
}

#[test]
fn sled_registry_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let signer = signer();
    let owner = Address([1u8; 20]);
    let signed = key("swift-noble-dragon");
    let auth = signer.issue(&owner, &signed);
    let fee = config().registration_fee;

    let random = {
        let store = Arc::new(SledRegistryStore::open(dir.path()).unwrap());
        let registry = Registry::open(config(), signer.verifier(), WordCorpus::builtin(), store)
            .unwrap()
            .with_entropy(Arc::new(SequenceEntropy::new(vec![9])));
        registry
            .register(&owner, &signed.partition, &signed.label, &auth, fee)
            .unwrap();
        registry.register_random(&owner, 3, fee).unwrap().key()
    };

    let store = Arc::new(SledRegistryStore::open(dir.path()).unwrap());
    let reopened =
        Registry::open(config(), signer.verifier(), WordCorpus::builtin(), store).unwrap();

    assert_eq!(reopened.owned_labels(&owner), vec![signed.clone(), random]);
    assert_eq!(reopened.fee_balance(), fee * 2);
    assert!(reopened.is_nonce_consumed(&auth.nonce));
    assert!(matches!(
        reopened
            .register(&owner, &signed.partition, &signed.label, &auth, fee)
            .unwrap_err(),
        RegistryError::ReplayedAuthorization
    ));
}

#[test]
fn persisted_corpus_wins_over_startup_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let admin = config().admin;
    let small = WordCorpus::new(
        vec!["amber".into()],
        vec!["quiet".into()],
        vec!["heron".into()],
        vec![Partition::new("Base").unwrap()],
    )
    .unwrap();

    {
        let store = Arc::new(SledRegistryStore::open(dir.path()).unwrap());
        let registry =
            Registry::open(config(), signer().verifier(), WordCorpus::builtin(), store).unwrap();
        registry.set_components(&admin, small.clone()).unwrap();
    }

    let store = Arc::new(SledRegistryStore::open(dir.path()).unwrap());
    let registry =
        Registry::open(config(), signer().verifier(), WordCorpus::builtin(), store).unwrap();
    assert_eq!(registry.components(), small);
}

/// Store that can be switched into a failing mode.
#[derive(Default)]
struct FlakyStore {
    failing: AtomicBool,
    inner: moniker_registry::MemoryRegistryStore,
}

impl RegistryStore for FlakyStore {
    fn load(&self) -> Result<PersistedState, StoreError> {
        self.inner.load()
    }

    fn commit(&self, batch: &[StoreWrite]) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk detached".into()));
        }
        self.inner.commit(batch)
    }
}

#[test]
fn failed_commit_leaves_state_untouched() {
    let store = Arc::new(FlakyStore::default());
    let signer = signer();
    let registry = Registry::open(
        config(),
        signer.verifier(),
        WordCorpus::builtin(),
        store.clone(),
    )
    .unwrap();
    let owner = Address([1u8; 20]);
    let fee = config().registration_fee;
    let first = key("swift-noble-dragon");
    let auth = signer.issue(&owner, &first);

    store.failing.store(true, Ordering::SeqCst);
    let err = registry
        .register(&owner, &first.partition, &first.label, &auth, fee)
        .unwrap_err();
    assert!(matches!(err, RegistryError::Storage(_)));
    assert!(!registry.is_registered(&first));
    assert!(!registry.is_nonce_consumed(&auth.nonce));
    assert_eq!(registry.fee_balance(), 0);
    assert_eq!(registry.domain_count(&owner), 0);

    store.failing.store(false, Ordering::SeqCst);
    registry
        .register(&owner, &first.partition, &first.label, &auth, fee)
        .unwrap();
    assert_eq!(registry.domain_count(&owner), 1);
}
