//! Moniker registry implementation
//!
//! Holds every committed `(label, partition)` record, the per-owner label
//! sets, consumed authorization nonces, the collected fee balance and the
//! active word corpus. Mutating operations take the single state lock for
//! their whole validate-then-commit sequence, so they are linearizable.

use crate::config::RegistryConfig;
use crate::entropy::{EntropySource, OsEntropy};
use crate::errors::*;
use crate::store::{MemoryRegistryStore, RegistryStore, RegistryTables, StoreWrite};
use metrics::counter;
use moniker_signer::CapabilityVerifier;
use moniker_types::{
    AccountState, Address, Authorization, Clock, DomainKey, DomainRecord, Label, Nonce, Partition,
    SystemClock, WordCorpus,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

const RANDOM_LABEL_DOMAIN: &[u8] = b"moniker.random-label.v1";

/// Receipt for a fee withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub to: Address,
    pub amount: u128,
}

#[derive(Debug)]
struct RegistryState {
    tables: RegistryTables,
    corpus: WordCorpus,
}

impl RegistryState {
    fn apply(&mut self, write: StoreWrite) {
        if let StoreWrite::SetCorpus(corpus) = write {
            self.corpus = corpus;
        } else {
            self.tables.apply(&write);
        }
    }

    fn labels_of(&self, owner: &Address) -> Vec<DomainKey> {
        self.tables.owners.get(owner).cloned().unwrap_or_default()
    }

    fn count_of(&self, owner: &Address) -> usize {
        self.tables.owners.get(owner).map_or(0, Vec::len)
    }
}

/// Moniker registry
pub struct Registry {
    config: RegistryConfig,
    verifier: CapabilityVerifier,
    state: RwLock<RegistryState>,
    store: Arc<dyn RegistryStore>,
    entropy: Arc<dyn EntropySource>,
    clock: Arc<dyn Clock>,
}

impl Registry {
    /// Open a registry over `store`.
    ///
    /// A corpus already persisted in the store wins over `corpus`; otherwise
    /// `corpus` is validated and committed as the initial one.
    pub fn open(
        config: RegistryConfig,
        verifier: CapabilityVerifier,
        corpus: WordCorpus,
        store: Arc<dyn RegistryStore>,
    ) -> Result<Self> {
        let persisted = store.load()?;
        let corpus = match persisted.corpus {
            Some(existing) => existing,
            None => {
                corpus.validate()?;
                store.commit(&[StoreWrite::SetCorpus(corpus.clone())])?;
                corpus
            }
        };

        info!(
            registry = %config.address,
            records = persisted.tables.records.len(),
            partitions = corpus.partitions.len(),
            combinations = corpus.combinations(),
            "Registry opened"
        );

        Ok(Self {
            config,
            verifier,
            state: RwLock::new(RegistryState {
                tables: persisted.tables,
                corpus,
            }),
            store,
            entropy: Arc::new(OsEntropy),
            clock: Arc::new(SystemClock),
        })
    }

    /// Registry backed by a fresh [`MemoryRegistryStore`].
    pub fn in_memory(
        config: RegistryConfig,
        verifier: CapabilityVerifier,
        corpus: WordCorpus,
    ) -> Result<Self> {
        Self::open(config, verifier, corpus, Arc::new(MemoryRegistryStore::new()))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.entropy = entropy;
        self
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Replace the word corpus. Admin only.
    pub fn set_components(&self, caller: &Address, corpus: WordCorpus) -> Result<()> {
        self.ensure_admin(caller)?;
        corpus.validate()?;

        let mut state = self.state.write();
        self.commit(&mut state, vec![StoreWrite::SetCorpus(corpus)])?;
        info!(
            admin = %caller,
            combinations = state.corpus.combinations(),
            partitions = state.corpus.partitions.len(),
            "Word corpus replaced"
        );
        Ok(())
    }

    /// Commit `(label, partition)` to `owner` under a signed capability.
    pub fn register(
        &self,
        owner: &Address,
        partition: &Partition,
        label: &Label,
        authorization: &Authorization,
        payment: u128,
    ) -> Result<DomainRecord> {
        let result = self.register_inner(owner, partition, label, authorization, payment);
        record_outcome("signed", &result);
        result
    }

    fn register_inner(
        &self,
        owner: &Address,
        partition: &Partition,
        label: &Label,
        authorization: &Authorization,
        payment: u128,
    ) -> Result<DomainRecord> {
        let key = DomainKey::new(partition.clone(), label.clone());
        self.ensure_owner(owner)?;
        check_in_corpus(&self.state.read().corpus, &key)?;
        self.ensure_payment(payment)?;

        if self
            .verifier
            .verify(
                owner,
                partition,
                label,
                authorization.deadline,
                &authorization.nonce,
                &authorization.signature,
            )
            .is_err()
        {
            warn!(owner = %owner, name = %key, "Rejected registration: invalid signature");
            return Err(RegistryError::InvalidSignature);
        }

        let now = self.clock.now_secs();
        if authorization.is_expired_at(now) {
            warn!(
                owner = %owner,
                name = %key,
                deadline = authorization.deadline,
                now,
                "Rejected registration: authorization expired"
            );
            return Err(RegistryError::AuthorizationExpired {
                deadline: authorization.deadline,
                now,
            });
        }

        let mut state = self.state.write();
        // The corpus may have been replaced since the unlocked check.
        check_in_corpus(&state.corpus, &key)?;

        if state.tables.consumed_nonces.contains(&authorization.nonce) {
            warn!(owner = %owner, name = %key, "Rejected registration: nonce replayed");
            return Err(RegistryError::ReplayedAuthorization);
        }
        self.ensure_quota(&state, owner)?;
        if state.tables.records.contains_key(&key) {
            return Err(RegistryError::AlreadyRegistered {
                name: key.to_string(),
                retryable: false,
            });
        }

        let record = DomainRecord::new(key.clone(), *owner, now);
        let mut batch = self.creation_batch(&state, &record, payment);
        batch.push(StoreWrite::ConsumeNonce(authorization.nonce));
        self.commit(&mut state, batch)?;

        info!(
            owner = %owner,
            name = %self.full_name(&key),
            "Domain registered"
        );
        Ok(record)
    }

    /// Register a label chosen by the registry's own entropy.
    pub fn register_random(
        &self,
        caller: &Address,
        partition_index: usize,
        payment: u128,
    ) -> Result<DomainRecord> {
        let result = self.register_random_inner(caller, partition_index, payment);
        record_outcome("random", &result);
        result
    }

    fn register_random_inner(
        &self,
        caller: &Address,
        partition_index: usize,
        payment: u128,
    ) -> Result<DomainRecord> {
        self.ensure_owner(caller)?;
        self.ensure_payment(payment)?;
        let nonce = self.entropy.next_nonce();

        let mut state = self.state.write();
        self.ensure_quota(&state, caller)?;

        let key = derive_random_key(&state.corpus, caller, nonce, partition_index)?;
        if state.tables.records.contains_key(&key) {
            debug!(owner = %caller, name = %key, "Random label collided");
            return Err(RegistryError::AlreadyRegistered {
                name: key.to_string(),
                retryable: true,
            });
        }

        let record = DomainRecord::new(key.clone(), *caller, self.clock.now_secs());
        let batch = self.creation_batch(&state, &record, payment);
        self.commit(&mut state, batch)?;

        info!(
            owner = %caller,
            name = %self.full_name(&key),
            "Random domain registered"
        );
        Ok(record)
    }

    /// Label `register_random` would pick for `(owner, nonce, partition_index)`.
    pub fn preview_random(
        &self,
        owner: &Address,
        nonce: u64,
        partition_index: usize,
    ) -> Result<DomainKey> {
        let state = self.state.read();
        derive_random_key(&state.corpus, owner, nonce, partition_index)
    }

    /// Move an existing record to `new_owner`.
    ///
    /// The recipient's quota is not checked; the quota only bounds creation.
    pub fn transfer_domain(
        &self,
        caller: &Address,
        partition: &Partition,
        label: &Label,
        new_owner: &Address,
    ) -> Result<DomainRecord> {
        self.ensure_owner(new_owner)?;
        let key = DomainKey::new(partition.clone(), label.clone());

        let mut state = self.state.write();
        let record = state
            .tables
            .records
            .get(&key)
            .cloned()
            .ok_or_else(|| RegistryError::DomainNotFound {
                name: key.to_string(),
            })?;
        if record.owner != *caller {
            return Err(RegistryError::NotOwner {
                name: key.to_string(),
                caller: *caller,
            });
        }
        if record.owner == *new_owner {
            return Ok(record);
        }

        let mut remaining = state.labels_of(caller);
        remaining.retain(|k| k != &key);
        let mut received = state.labels_of(new_owner);
        received.push(key.clone());
        let updated = DomainRecord {
            owner: *new_owner,
            ..record
        };

        self.commit(
            &mut state,
            vec![
                StoreWrite::PutRecord(updated.clone()),
                StoreWrite::PutOwnerLabels {
                    owner: *caller,
                    labels: remaining,
                },
                StoreWrite::PutOwnerLabels {
                    owner: *new_owner,
                    labels: received,
                },
            ],
        )?;

        info!(from = %caller, to = %new_owner, name = %key, "Domain transferred");
        Ok(updated)
    }

    /// Pay out and zero the fee balance. Admin only.
    pub fn withdraw(&self, caller: &Address) -> Result<Withdrawal> {
        self.ensure_admin(caller)?;

        let mut state = self.state.write();
        let amount = state.tables.fee_balance;
        self.commit(&mut state, vec![StoreWrite::SetFeeBalance(0)])?;

        info!(to = %caller, amount = %amount, "Fees withdrawn");
        Ok(Withdrawal { to: *caller, amount })
    }

    pub fn get_record(&self, partition: &Partition, label: &Label) -> Option<DomainRecord> {
        let key = DomainKey::new(partition.clone(), label.clone());
        self.state.read().tables.records.get(&key).cloned()
    }

    pub fn is_registered(&self, key: &DomainKey) -> bool {
        self.state.read().tables.records.contains_key(key)
    }

    /// Owned keys in acquisition order.
    pub fn owned_labels(&self, owner: &Address) -> Vec<DomainKey> {
        self.state.read().labels_of(owner)
    }

    pub fn domain_count(&self, owner: &Address) -> usize {
        self.state.read().count_of(owner)
    }

    pub fn account(&self, owner: &Address) -> AccountState {
        AccountState::new(*owner, self.owned_labels(owner))
    }

    pub fn components(&self) -> WordCorpus {
        self.state.read().corpus.clone()
    }

    pub fn fee_balance(&self) -> u128 {
        self.state.read().tables.fee_balance
    }

    pub fn is_nonce_consumed(&self, nonce: &Nonce) -> bool {
        self.state.read().tables.consumed_nonces.contains(nonce)
    }

    pub fn record_count(&self) -> usize {
        self.state.read().tables.records.len()
    }

    pub fn full_name(&self, key: &DomainKey) -> String {
        key.full_name(&self.config.domain_suffix)
    }

    fn commit(&self, state: &mut RegistryState, batch: Vec<StoreWrite>) -> Result<()> {
        if let Err(err) = self.store.commit(&batch) {
            warn!(error = %err, "Registry commit rejected by store");
            return Err(err.into());
        }
        for write in batch {
            state.apply(write);
        }
        Ok(())
    }

    fn creation_batch(
        &self,
        state: &RegistryState,
        record: &DomainRecord,
        payment: u128,
    ) -> Vec<StoreWrite> {
        let mut labels = state.labels_of(&record.owner);
        labels.push(record.key());
        let mut batch = vec![
            StoreWrite::PutRecord(record.clone()),
            StoreWrite::PutOwnerLabels {
                owner: record.owner,
                labels,
            },
        ];
        if payment > 0 {
            batch.push(StoreWrite::SetFeeBalance(
                state.tables.fee_balance.saturating_add(payment),
            ));
        }
        batch
    }

    fn ensure_admin(&self, caller: &Address) -> Result<()> {
        if *caller != self.config.admin {
            warn!(caller = %caller, "Rejected admin call");
            return Err(RegistryError::Unauthorized { caller: *caller });
        }
        Ok(())
    }

    fn ensure_owner(&self, owner: &Address) -> Result<()> {
        if owner.is_zero() {
            return Err(RegistryError::InvalidOwner(*owner));
        }
        Ok(())
    }

    fn ensure_payment(&self, payment: u128) -> Result<()> {
        if self.config.payment_required() && payment < self.config.registration_fee {
            return Err(RegistryError::InsufficientPayment {
                required: self.config.registration_fee,
                provided: payment,
            });
        }
        Ok(())
    }

    fn ensure_quota(&self, state: &RegistryState, owner: &Address) -> Result<()> {
        if state.count_of(owner) >= self.config.max_domains_per_user {
            return Err(RegistryError::QuotaExceeded {
                owner: *owner,
                limit: self.config.max_domains_per_user,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("verifier", &self.verifier)
            .field("records", &self.record_count())
            .finish()
    }
}

fn check_in_corpus(corpus: &WordCorpus, key: &DomainKey) -> Result<()> {
    if !corpus.has_partition(&key.partition) {
        return Err(RegistryError::UnknownPartition {
            partition: key.partition.to_string(),
        });
    }
    if !corpus.contains_label(&key.label) {
        return Err(RegistryError::LabelNotInCorpus {
            label: key.label.to_string(),
        });
    }
    Ok(())
}

fn record_outcome(mode: &'static str, result: &Result<DomainRecord>) {
    match result {
        Ok(_) => counter!("moniker_registrations_total", "mode" => mode).increment(1),
        Err(err) => counter!(
            "moniker_registration_failures_total",
            "mode" => mode,
            "reason" => err.kind()
        )
        .increment(1),
    }
}

/// Deterministic `(owner, nonce, partition_index)` to key mapping.
fn derive_random_key(
    corpus: &WordCorpus,
    owner: &Address,
    nonce: u64,
    partition_index: usize,
) -> Result<DomainKey> {
    let partition = corpus
        .partition_at(partition_index)
        .cloned()
        .ok_or(RegistryError::PartitionIndexOutOfRange {
            index: partition_index,
            count: corpus.partitions.len(),
        })?;

    let mut hasher = Sha256::new();
    hasher.update(RANDOM_LABEL_DOMAIN);
    hasher.update(owner.as_bytes());
    hasher.update(nonce.to_be_bytes());
    hasher.update((partition_index as u64).to_be_bytes());
    let seed: [u8; 32] = hasher.finalize().into();

    let pick = |offset: usize, len: usize| -> usize {
        let mut word = [0u8; 8];
        word.copy_from_slice(&seed[offset..offset + 8]);
        match len {
            0 => 0,
            len => (u64::from_be_bytes(word) % len as u64) as usize,
        }
    };

    let label = corpus
        .label_at(
            pick(0, corpus.adjectives.len()),
            pick(8, corpus.descriptors.len()),
            pick(16, corpus.nouns.len()),
        )
        .ok_or_else(|| RegistryError::LabelNotInCorpus {
            label: "<empty corpus>".to_string(),
        })??;

    Ok(DomainKey::new(partition, label))
}
