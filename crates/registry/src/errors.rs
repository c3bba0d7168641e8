//! Error types for the moniker registry

use crate::store::StoreError;
use moniker_types::{Address, CorpusError, LabelError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Unauthorized: {caller} is not the registry admin")]
    Unauthorized { caller: Address },

    #[error("Invalid authorization signature")]
    InvalidSignature,

    #[error("Authorization expired at {deadline} (now {now})")]
    AuthorizationExpired { deadline: u64, now: u64 },

    #[error("Authorization nonce already used")]
    ReplayedAuthorization,

    #[error("Quota exceeded: {owner} already holds {limit} domains")]
    QuotaExceeded { owner: Address, limit: usize },

    #[error("Domain already registered: {name}{}", retry_hint(.retryable))]
    AlreadyRegistered { name: String, retryable: bool },

    #[error("Domain not found: {name}")]
    DomainNotFound { name: String },

    #[error("Not owner: {caller} does not own {name}")]
    NotOwner { name: String, caller: Address },

    #[error("Insufficient payment: required {required}, provided {provided}")]
    InsufficientPayment { required: u128, provided: u128 },

    #[error("Unknown partition: {partition}")]
    UnknownPartition { partition: String },

    #[error("Partition index {index} out of range ({count} configured)")]
    PartitionIndexOutOfRange { index: usize, count: usize },

    #[error("Label {label} is not composed from the configured word lists")]
    LabelNotInCorpus { label: String },

    #[error("Invalid label: {0}")]
    InvalidLabel(#[from] LabelError),

    #[error("Invalid components: {0}")]
    InvalidComponents(#[from] CorpusError),

    #[error("Invalid owner address: {0}")]
    InvalidOwner(Address),

    #[error("Registry storage error: {0}")]
    Storage(#[from] StoreError),
}

fn retry_hint(retryable: &bool) -> &'static str {
    if *retryable {
        " (try again)"
    } else {
        ""
    }
}

impl RegistryError {
    /// True when repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RegistryError::AlreadyRegistered {
                retryable: true,
                ..
            }
        )
    }

    /// Stable short name, used as a metrics label and in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::Unauthorized { .. } => "unauthorized",
            RegistryError::InvalidSignature => "invalid_signature",
            RegistryError::AuthorizationExpired { .. } => "authorization_expired",
            RegistryError::ReplayedAuthorization => "replayed_authorization",
            RegistryError::QuotaExceeded { .. } => "quota_exceeded",
            RegistryError::AlreadyRegistered { .. } => "already_registered",
            RegistryError::DomainNotFound { .. } => "domain_not_found",
            RegistryError::NotOwner { .. } => "not_owner",
            RegistryError::InsufficientPayment { .. } => "insufficient_payment",
            RegistryError::UnknownPartition { .. } => "unknown_partition",
            RegistryError::PartitionIndexOutOfRange { .. } => "partition_index_out_of_range",
            RegistryError::LabelNotInCorpus { .. } => "label_not_in_corpus",
            RegistryError::InvalidLabel(_) => "invalid_label",
            RegistryError::InvalidComponents(_) => "invalid_components",
            RegistryError::InvalidOwner(_) => "invalid_owner",
            RegistryError::Storage(_) => "storage",
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
