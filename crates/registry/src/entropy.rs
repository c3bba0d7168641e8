//! Registry-local entropy used by `register_random`.
//!
//! This source is deliberately separate from the signer's nonce generator:
//! it only picks which label a random registration lands on, it never
//! protects a capability.

use rand_core::{OsRng, RngCore};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

pub trait EntropySource: Send + Sync + fmt::Debug {
    fn next_nonce(&self) -> u64;
}

/// Operating-system randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn next_nonce(&self) -> u64 {
        OsRng.next_u64()
    }
}

/// Replays a fixed sequence, wrapping around at the end.
#[derive(Debug)]
pub struct SequenceEntropy {
    values: Vec<u64>,
    cursor: AtomicUsize,
}

impl SequenceEntropy {
    pub fn new(values: Vec<u64>) -> Self {
        Self {
            values,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl EntropySource for SequenceEntropy {
    fn next_nonce(&self) -> u64 {
        if self.values.is_empty() {
            return 0;
        }
        let index = self.cursor.fetch_add(1, Ordering::SeqCst) % self.values.len();
        self.values[index]
    }
}
