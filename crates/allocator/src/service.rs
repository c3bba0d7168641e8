//! Allocate and Status operations.

use crate::errors::*;
use crate::generator::LabelGenerator;
use crate::policy::RetryPolicy;
use crate::probe::{AvailabilityProber, RegistryReader};
use metrics::counter;
use moniker_signer::CapabilitySigner;
use moniker_types::{
    Address, Authorization, DomainKey, Label, Nonce, Partition, SignatureBytes, WordCorpus,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything a client needs to redeem an allocation at the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationGrant {
    pub partition: Partition,
    pub label: Label,
    pub full_name: String,
    pub owner: Address,
    pub deadline: u64,
    pub nonce: Nonce,
    pub signature: SignatureBytes,
    pub registry_address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatus {
    pub owner: Address,
    pub registration_count: usize,
    pub max_allowed: usize,
}

pub struct AllocationService {
    signer: Arc<CapabilitySigner>,
    prober: AvailabilityProber,
    generator: LabelGenerator,
    policy: RetryPolicy,
}

impl AllocationService {
    pub fn new(
        signer: Arc<CapabilitySigner>,
        reader: Arc<dyn RegistryReader>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            signer,
            prober: AvailabilityProber::new(reader, policy.probe_timeout()),
            generator: LabelGenerator::default(),
            policy,
        }
    }

    pub fn with_generator(mut self, generator: LabelGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Find a free label in `partition` within the attempt bound.
    pub async fn allocate(&self, partition: &Partition) -> Result<Label> {
        let corpus = self.prober.components().await?;
        if !corpus.has_partition(partition) {
            return Err(AllocationError::UnknownPartition {
                partition: partition.to_string(),
            });
        }
        self.search(&corpus, partition).await
    }

    async fn search(
        &self,
        corpus: &WordCorpus,
        partition: &Partition,
    ) -> Result<Label> {
        let attempts = self.policy.max_attempts();
        for attempt in 1..=attempts {
            let label = self.generator.propose(corpus)?;
            let key = DomainKey::new(partition.clone(), label);
            if self.prober.is_available(&key).await {
                debug!(name = %key, attempt, "Found available label");
                return Ok(key.label);
            }
        }
        warn!(partition = %partition, attempts, "Allocation exhausted");
        Err(AllocationError::ExhaustedAttempts { attempts })
    }

    /// Allocate handler: validate the owner, pick a partition, find a free
    /// label and sign a capability for it.
    pub async fn grant(&self, owner: &str, partition: Option<&str>) -> Result<AllocationGrant> {
        let result = self.grant_inner(owner, partition).await;
        match &result {
            Ok(_) => counter!("moniker_allocations_total").increment(1),
            Err(err) => {
                counter!("moniker_allocation_failures_total", "reason" => err.kind()).increment(1)
            }
        }
        result
    }

    async fn grant_inner(&self, owner: &str, partition: Option<&str>) -> Result<AllocationGrant> {
        let owner = parse_owner(owner)?;
        let corpus = self.prober.components().await?;

        let partition = match partition {
            Some(raw) => {
                let partition =
                    Partition::new(raw).map_err(|_| AllocationError::UnknownPartition {
                        partition: raw.to_string(),
                    })?;
                if !corpus.has_partition(&partition) {
                    return Err(AllocationError::UnknownPartition {
                        partition: partition.to_string(),
                    });
                }
                partition
            }
            None => self.generator.choose_partition(&corpus)?,
        };

        let label = self.search(&corpus, &partition).await?;
        let key = DomainKey::new(partition, label);
        let auth = self.signer.issue(&owner, &key);
        let descriptor = self.prober.reader().descriptor();

        info!(
            owner = %owner,
            name = %key,
            deadline = auth.deadline,
            "Issued allocation"
        );

        Ok(AllocationGrant {
            full_name: key.full_name(&descriptor.domain_suffix),
            partition: auth.partition,
            label: auth.label,
            owner,
            deadline: auth.deadline,
            nonce: auth.nonce,
            signature: auth.signature,
            registry_address: descriptor.address,
        })
    }

    /// Status handler.
    pub async fn status(&self, owner: &str) -> Result<AccountStatus> {
        let owner = parse_owner(owner)?;
        let registration_count = self.prober.domain_count(&owner).await?;
        Ok(AccountStatus {
            owner,
            registration_count,
            max_allowed: self.prober.reader().descriptor().max_domains_per_user,
        })
    }
}

impl std::fmt::Debug for AllocationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocationService")
            .field("signer", &self.signer)
            .field("prober", &self.prober)
            .field("policy", &self.policy)
            .finish()
    }
}

fn parse_owner(raw: &str) -> Result<Address> {
    let owner = Address::parse(raw)?;
    if owner.is_zero() {
        return Err(AllocationError::ZeroAddress);
    }
    Ok(owner)
}

impl AllocationGrant {
    /// Reassemble the authorization the grant was built from.
    pub fn authorization(&self) -> Authorization {
        Authorization {
            partition: self.partition.clone(),
            label: self.label.clone(),
            owner: self.owner,
            deadline: self.deadline,
            nonce: self.nonce,
            signature: self.signature,
        }
    }
}
