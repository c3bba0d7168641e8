//! Random label proposals.

use crate::errors::*;
use moniker_types::{Label, Partition, WordCorpus};
use rand::rngs::OsRng;
use rand::Rng;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Uniform index source. `pick(len)` returns a value in `0..len` for `len > 0`.
pub trait RandomSource: Send + Sync + fmt::Debug {
    fn pick(&self, len: usize) -> usize;
}

/// OS CSPRNG; safe to share across threads without locking.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn pick(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        OsRng.gen_range(0..len)
    }
}

/// Replays fixed values (reduced modulo `len`), wrapping at the end.
#[derive(Debug)]
pub struct SequenceRandom {
    values: Vec<usize>,
    cursor: AtomicUsize,
}

impl SequenceRandom {
    pub fn new(values: Vec<usize>) -> Self {
        Self {
            values,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl RandomSource for SequenceRandom {
    fn pick(&self, len: usize) -> usize {
        if len == 0 || self.values.is_empty() {
            return 0;
        }
        let index = self.cursor.fetch_add(1, Ordering::SeqCst) % self.values.len();
        self.values[index] % len
    }
}

#[derive(Debug, Clone)]
pub struct LabelGenerator {
    random: Arc<dyn RandomSource>,
}

impl LabelGenerator {
    pub fn new(random: Arc<dyn RandomSource>) -> Self {
        Self { random }
    }

    /// Draw one word from each list independently.
    pub fn propose(&self, corpus: &WordCorpus) -> Result<Label> {
        let adjective = self.random.pick(corpus.adjectives.len());
        let descriptor = self.random.pick(corpus.descriptors.len());
        let noun = self.random.pick(corpus.nouns.len());
        match corpus.label_at(adjective, descriptor, noun) {
            Some(Ok(label)) => Ok(label),
            Some(Err(err)) => Err(AllocationError::PartitionMisconfigured {
                reason: err.to_string(),
            }),
            None => Err(AllocationError::PartitionMisconfigured {
                reason: "word lists are empty".to_string(),
            }),
        }
    }

    /// Uniform draw over the configured partitions.
    pub fn choose_partition(&self, corpus: &WordCorpus) -> Result<Partition> {
        let index = self.random.pick(corpus.partitions.len());
        corpus
            .partition_at(index)
            .cloned()
            .ok_or_else(|| AllocationError::PartitionMisconfigured {
                reason: "no partitions configured".to_string(),
            })
    }
}

impl Default for LabelGenerator {
    fn default() -> Self {
        Self::new(Arc::new(OsRandom))
    }
}
