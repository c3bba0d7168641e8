//! Write-through persistence for registry state.
//!
//! Every registry mutation is expressed as a batch of [`StoreWrite`]s. The
//! batch is committed to the store first and only then applied to the
//! in-memory view, so a rejected commit leaves the registry untouched.

use moniker_types::{Address, DomainKey, DomainRecord, Nonce, WordCorpus};
use parking_lot::RwLock;
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::{Db, Tree};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

const FEE_BALANCE_KEY: &[u8] = b"fee_balance";
const CORPUS_KEY: &[u8] = b"corpus";

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Corrupt entry in `{tree}`: {reason}")]
    Corrupt { tree: &'static str, reason: String },
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// One durable change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWrite {
    /// Insert or replace a record.
    PutRecord(DomainRecord),
    /// Replace the full label list of an owner. An empty list removes the owner.
    PutOwnerLabels { owner: Address, labels: Vec<DomainKey> },
    ConsumeNonce(Nonce),
    SetFeeBalance(u128),
    SetCorpus(WordCorpus),
}

/// Records, owner sets, consumed nonces and the fee balance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryTables {
    pub records: HashMap<DomainKey, DomainRecord>,
    pub owners: HashMap<Address, Vec<DomainKey>>,
    pub consumed_nonces: HashSet<Nonce>,
    pub fee_balance: u128,
}

impl RegistryTables {
    /// Apply a write. `SetCorpus` is not part of the tables and is ignored.
    pub fn apply(&mut self, write: &StoreWrite) {
        match write {
            StoreWrite::PutRecord(record) => {
                self.records.insert(record.key(), record.clone());
            }
            StoreWrite::PutOwnerLabels { owner, labels } => {
                if labels.is_empty() {
                    self.owners.remove(owner);
                } else {
                    self.owners.insert(*owner, labels.clone());
                }
            }
            StoreWrite::ConsumeNonce(nonce) => {
                self.consumed_nonces.insert(*nonce);
            }
            StoreWrite::SetFeeBalance(balance) => self.fee_balance = *balance,
            StoreWrite::SetCorpus(_) => {}
        }
    }
}

/// Everything a store hands back on startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedState {
    pub tables: RegistryTables,
    /// `None` until a corpus has been committed.
    pub corpus: Option<WordCorpus>,
}

impl PersistedState {
    pub fn apply(&mut self, write: &StoreWrite) {
        if let StoreWrite::SetCorpus(corpus) = write {
            self.corpus = Some(corpus.clone());
        }
        self.tables.apply(write);
    }
}

/// Durable backing for a registry.
pub trait RegistryStore: Send + Sync {
    fn load(&self) -> Result<PersistedState, StoreError>;

    /// Commit a batch atomically: either every write lands or none does.
    fn commit(&self, batch: &[StoreWrite]) -> Result<(), StoreError>;
}

/// In-memory store, used by default and in tests.
#[derive(Debug, Default)]
pub struct MemoryRegistryStore {
    state: RwLock<PersistedState>,
}

impl MemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistryStore for MemoryRegistryStore {
    fn load(&self) -> Result<PersistedState, StoreError> {
        Ok(self.state.read().clone())
    }

    fn commit(&self, batch: &[StoreWrite]) -> Result<(), StoreError> {
        let mut state = self.state.write();
        for write in batch {
            state.apply(write);
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Target {
    Records,
    Owners,
    Nonces,
    Meta,
}

enum Encoded {
    Insert(Target, Vec<u8>, Vec<u8>),
    Remove(Target, Vec<u8>),
}

/// Sled-backed implementation
pub struct SledRegistryStore {
    db: Db,
    records: Tree,
    owners: Tree,
    nonces: Tree,
    meta: Tree,
}

impl SledRegistryStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::from_db(sled::open(path)?)
    }

    /// Throwaway database removed on drop.
    pub fn temporary() -> Result<Self, StoreError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        let records = db.open_tree("records")?;
        let owners = db.open_tree("owners")?;
        let nonces = db.open_tree("nonces")?;
        let meta = db.open_tree("meta")?;
        Ok(Self {
            db,
            records,
            owners,
            nonces,
            meta,
        })
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    fn encode(write: &StoreWrite) -> Result<Encoded, StoreError> {
        Ok(match write {
            StoreWrite::PutRecord(record) => Encoded::Insert(
                Target::Records,
                record.key().storage_key(),
                serde_json::to_vec(record)?,
            ),
            StoreWrite::PutOwnerLabels { owner, labels } if labels.is_empty() => {
                Encoded::Remove(Target::Owners, owner.as_bytes().to_vec())
            }
            StoreWrite::PutOwnerLabels { owner, labels } => Encoded::Insert(
                Target::Owners,
                owner.as_bytes().to_vec(),
                serde_json::to_vec(labels)?,
            ),
            StoreWrite::ConsumeNonce(nonce) => {
                Encoded::Insert(Target::Nonces, nonce.as_bytes().to_vec(), Vec::new())
            }
            StoreWrite::SetFeeBalance(balance) => Encoded::Insert(
                Target::Meta,
                FEE_BALANCE_KEY.to_vec(),
                balance.to_be_bytes().to_vec(),
            ),
            StoreWrite::SetCorpus(corpus) => Encoded::Insert(
                Target::Meta,
                CORPUS_KEY.to_vec(),
                serde_json::to_vec(corpus)?,
            ),
        })
    }
}

fn fixed<const N: usize>(tree: &'static str, bytes: &[u8]) -> Result<[u8; N], StoreError> {
    bytes.try_into().map_err(|_| StoreError::Corrupt {
        tree,
        reason: format!("expected {N} bytes, found {}", bytes.len()),
    })
}

impl RegistryStore for SledRegistryStore {
    fn load(&self) -> Result<PersistedState, StoreError> {
        let mut state = PersistedState::default();

        for entry in self.records.iter() {
            let (_, value) = entry?;
            let record: DomainRecord = serde_json::from_slice(&value)?;
            state.tables.records.insert(record.key(), record);
        }
        for entry in self.owners.iter() {
            let (key, value) = entry?;
            let owner = Address(fixed("owners", &key)?);
            let labels: Vec<DomainKey> = serde_json::from_slice(&value)?;
            state.tables.owners.insert(owner, labels);
        }
        for entry in self.nonces.iter() {
            let (key, _) = entry?;
            state.tables.consumed_nonces.insert(Nonce(fixed("nonces", &key)?));
        }
        if let Some(value) = self.meta.get(FEE_BALANCE_KEY)? {
            state.tables.fee_balance = u128::from_be_bytes(fixed("meta", &value)?);
        }
        if let Some(value) = self.meta.get(CORPUS_KEY)? {
            state.corpus = Some(serde_json::from_slice(&value)?);
        }

        Ok(state)
    }

    fn commit(&self, batch: &[StoreWrite]) -> Result<(), StoreError> {
        let encoded = batch
            .iter()
            .map(Self::encode)
            .collect::<Result<Vec<_>, _>>()?;

        (&self.records, &self.owners, &self.nonces, &self.meta)
            .transaction(|(records, owners, nonces, meta)| {
                let tree = |target: Target| match target {
                    Target::Records => records,
                    Target::Owners => owners,
                    Target::Nonces => nonces,
                    Target::Meta => meta,
                };
                for op in &encoded {
                    match op {
                        Encoded::Insert(target, key, value) => {
                            tree(*target).insert(key.as_slice(), value.as_slice())?;
                        }
                        Encoded::Remove(target, key) => {
                            tree(*target).remove(key.as_slice())?;
                        }
                    }
                }
                Ok::<(), ConflictableTransactionError<()>>(())
            })
            .map_err(|err| match err {
                TransactionError::Storage(err) => StoreError::Database(err),
                TransactionError::Abort(()) => {
                    StoreError::Unavailable("transaction aborted".to_string())
                }
            })?;

        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moniker_types::{Label, Partition};

    fn record(label: &str, owner: u8) -> DomainRecord {
        let key = DomainKey::new(Partition::new("OP").unwrap(), Label::parse(label).unwrap());
        DomainRecord::new(key, Address([owner; 20]), 1_000)
    }

    fn batch() -> Vec<StoreWrite> {
        let record = record("swift-noble-dragon", 1);
        vec![
            StoreWrite::PutRecord(record.clone()),
            StoreWrite::PutOwnerLabels {
                owner: record.owner,
                labels: vec![record.key()],
            },
            StoreWrite::ConsumeNonce(Nonce([7u8; 32])),
            StoreWrite::SetFeeBalance(42),
            StoreWrite::SetCorpus(WordCorpus::builtin()),
        ]
    }

    #[test]
    fn memory_store_applies_batches() {
        let store = MemoryRegistryStore::new();
        store.commit(&batch()).unwrap();
        let state = store.load().unwrap();
        assert_eq!(state.tables.records.len(), 1);
        assert_eq!(state.tables.fee_balance, 42);
        assert!(state.tables.consumed_nonces.contains(&Nonce([7u8; 32])));
        assert_eq!(state.corpus, Some(WordCorpus::builtin()));
    }

    #[test]
    fn sled_store_matches_memory_store() {
        let memory = MemoryRegistryStore::new();
        let sled = SledRegistryStore::temporary().unwrap();
        memory.commit(&batch()).unwrap();
        sled.commit(&batch()).unwrap();
        assert_eq!(memory.load().unwrap(), sled.load().unwrap());
    }

    #[test]
    fn empty_owner_list_removes_owner() {
        let store = SledRegistryStore::temporary().unwrap();
        store.commit(&batch()).unwrap();
        store
            .commit(&[StoreWrite::PutOwnerLabels {
                owner: Address([1u8; 20]),
                labels: vec![],
            }])
            .unwrap();
        assert!(store.load().unwrap().tables.owners.is_empty());
    }
}
