//! Registry availability probing.

use crate::errors::ProbeError;
use async_trait::async_trait;
use moniker_registry::Registry;
use moniker_types::{Address, DomainKey, WordCorpus};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Static facts about the registry an allocator targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryDescriptor {
    pub address: Address,
    pub max_domains_per_user: usize,
    pub domain_suffix: String,
}

/// Read-only view of the registry used by the allocator.
#[async_trait]
pub trait RegistryReader: Send + Sync {
    fn descriptor(&self) -> RegistryDescriptor;

    async fn is_registered(&self, key: &DomainKey) -> Result<bool, ProbeError>;

    async fn components(&self) -> Result<WordCorpus, ProbeError>;

    async fn domain_count(&self, owner: &Address) -> Result<usize, ProbeError>;
}

/// Reader over a registry living in the same process.
#[derive(Debug, Clone)]
pub struct LocalRegistryReader {
    registry: Arc<Registry>,
}

impl LocalRegistryReader {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Registry reads take its lock, so they run on the blocking pool where
    /// a held write lock cannot stall the caller's timeout.
    async fn read<T, F>(&self, query: F) -> Result<T, ProbeError>
    where
        T: Send + 'static,
        F: FnOnce(&Registry) -> T + Send + 'static,
    {
        let registry = self.registry.clone();
        tokio::task::spawn_blocking(move || query(registry.as_ref()))
            .await
            .map_err(|err| ProbeError::Backend(format!("registry read failed: {err}")))
    }
}

#[async_trait]
impl RegistryReader for LocalRegistryReader {
    fn descriptor(&self) -> RegistryDescriptor {
        let config = self.registry.config();
        RegistryDescriptor {
            address: config.address,
            max_domains_per_user: config.max_domains_per_user,
            domain_suffix: config.domain_suffix.clone(),
        }
    }

    async fn is_registered(&self, key: &DomainKey) -> Result<bool, ProbeError> {
        let key = key.clone();
        self.read(move |registry| registry.is_registered(&key)).await
    }

    async fn components(&self) -> Result<WordCorpus, ProbeError> {
        self.read(|registry| registry.components()).await
    }

    async fn domain_count(&self, owner: &Address) -> Result<usize, ProbeError> {
        let owner = *owner;
        self.read(move |registry| registry.domain_count(&owner)).await
    }
}

/// Wraps every registry query in a bounded timeout.
#[derive(Clone)]
pub struct AvailabilityProber {
    reader: Arc<dyn RegistryReader>,
    timeout: Duration,
}

impl AvailabilityProber {
    pub fn new(reader: Arc<dyn RegistryReader>, timeout: Duration) -> Self {
        Self { reader, timeout }
    }

    pub fn reader(&self) -> &Arc<dyn RegistryReader> {
        &self.reader
    }

    /// True only when the registry positively reports no record.
    /// Timeouts and backend faults count as unavailable.
    pub async fn is_available(&self, key: &DomainKey) -> bool {
        match self.bounded(self.reader.is_registered(key)).await {
            Ok(registered) => {
                debug!(name = %key, registered, "Probed label");
                !registered
            }
            Err(err) => {
                warn!(name = %key, error = %err, "Inconclusive availability probe");
                false
            }
        }
    }

    pub async fn components(&self) -> Result<WordCorpus, ProbeError> {
        self.bounded(self.reader.components()).await
    }

    pub async fn domain_count(&self, owner: &Address) -> Result<usize, ProbeError> {
        self.bounded(self.reader.domain_count(owner)).await
    }

    async fn bounded<T>(
        &self,
        query: impl Future<Output = Result<T, ProbeError>>,
    ) -> Result<T, ProbeError> {
        timeout(self.timeout, query)
            .await
            .map_err(|_| ProbeError::Timeout {
                after: self.timeout,
            })?
    }
}

impl std::fmt::Debug for AvailabilityProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvailabilityProber")
            .field("registry", &self.reader.descriptor().address)
            .field("timeout", &self.timeout)
            .finish()
    }
}
