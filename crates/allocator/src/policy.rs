use crate::errors::*;
use std::time::Duration;

/// Hard ceiling on propose-and-probe rounds per allocation.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bounds for the availability search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    probe_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, probe_timeout: Duration) -> Result<Self> {
        if max_attempts == 0 {
            return Err(AllocationError::InvalidRetryPolicy);
        }
        Ok(Self {
            max_attempts,
            probe_timeout,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Upper bound on a single registry query.
    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}
