//! Error types for allocation

use moniker_types::AddressError;
use std::time::Duration;
use thiserror::Error;

/// Failures talking to the registry while probing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("registry probe timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("registry backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("Invalid owner address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("Invalid owner address: the zero address cannot own a domain")]
    ZeroAddress,

    #[error("Partition {partition} is not configured")]
    UnknownPartition { partition: String },

    #[error("Partition misconfigured: {reason}")]
    PartitionMisconfigured { reason: String },

    #[error("Could not find an available label after {attempts} attempts")]
    ExhaustedAttempts { attempts: u32 },

    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(#[from] ProbeError),

    #[error("Retry policy must allow at least one attempt")]
    InvalidRetryPolicy,
}

impl AllocationError {
    /// Stable short name, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            AllocationError::InvalidAddress(_) | AllocationError::ZeroAddress => "invalid_address",
            AllocationError::UnknownPartition { .. } => "unknown_partition",
            AllocationError::PartitionMisconfigured { .. } => "partition_misconfigured",
            AllocationError::ExhaustedAttempts { .. } => "exhausted",
            AllocationError::RegistryUnavailable(ProbeError::Timeout { .. }) => "timeout",
            AllocationError::RegistryUnavailable(_) => "registry_unavailable",
            AllocationError::InvalidRetryPolicy => "invalid_policy",
        }
    }
}

pub type Result<T> = std::result::Result<T, AllocationError>;
