use crate::address::Address;
use crate::label::{DomainKey, Label, Partition};
use serde::{Deserialize, Serialize};

/// Committed registration. Records are never deleted; only `owner` changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRecord {
    pub label: Label,
    pub partition: Partition,
    pub owner: Address,
    /// Seconds since UNIX_EPOCH at commit time.
    pub created_at: u64,
    pub exists: bool,
}

impl DomainRecord {
    pub fn new(key: DomainKey, owner: Address, created_at: u64) -> Self {
        Self {
            label: key.label,
            partition: key.partition,
            owner,
            created_at,
            exists: true,
        }
    }

    pub fn key(&self) -> DomainKey {
        DomainKey::new(self.partition.clone(), self.label.clone())
    }
}

/// Derived view over the records an account owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountState {
    pub address: Address,
    /// Owned keys in acquisition order.
    pub labels: Vec<DomainKey>,
    pub domain_count: usize,
}

impl AccountState {
    pub fn new(address: Address, labels: Vec<DomainKey>) -> Self {
        let domain_count = labels.len();
        Self {
            address,
            labels,
            domain_count,
        }
    }

    pub fn owns(&self, key: &DomainKey) -> bool {
        self.labels.contains(key)
    }
}
