//! Word corpus used to compose labels, plus the configured partition list.

use crate::label::{is_word, Label, LabelError, Partition};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised when validating a corpus.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorpusError {
    #[error("corpus list `{list}` is empty")]
    EmptyList { list: &'static str },
    #[error("corpus word {word:?} in `{list}` must be lowercase ascii alphanumeric")]
    InvalidWord { list: &'static str, word: String },
    #[error("corpus word {word:?} appears more than once across the word lists")]
    DuplicateWord { word: String },
    #[error("partition {partition} is listed more than once")]
    DuplicatePartition { partition: Partition },
}

/// Adjective, descriptor and noun lists plus the partition list.
///
/// The three word lists are disjoint and free of duplicates, so draws are
/// uniform over distinct words and a label maps back to a single position
/// in each list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCorpus {
    pub adjectives: Vec<String>,
    pub descriptors: Vec<String>,
    pub nouns: Vec<String>,
    pub partitions: Vec<Partition>,
}

impl WordCorpus {
    /// Build and validate a corpus.
    pub fn new(
        adjectives: Vec<String>,
        descriptors: Vec<String>,
        nouns: Vec<String>,
        partitions: Vec<Partition>,
    ) -> Result<Self, CorpusError> {
        let corpus = Self {
            adjectives,
            descriptors,
            nouns,
            partitions,
        };
        corpus.validate()?;
        Ok(corpus)
    }

    /// Corpus shipped with the crate.
    pub fn builtin() -> Self {
        let words = |list: &[&str]| list.iter().map(|w| (*w).to_string()).collect();
        Self {
            adjectives: words(BUILTIN_ADJECTIVES),
            descriptors: words(BUILTIN_DESCRIPTORS),
            nouns: words(BUILTIN_NOUNS),
            partitions: BUILTIN_PARTITIONS
                .iter()
                .filter_map(|p| Partition::new(*p).ok())
                .collect(),
        }
    }

    pub fn validate(&self) -> Result<(), CorpusError> {
        let mut seen = HashSet::new();
        for (list, words) in [
            ("adjectives", &self.adjectives),
            ("descriptors", &self.descriptors),
            ("nouns", &self.nouns),
        ] {
            if words.is_empty() {
                return Err(CorpusError::EmptyList { list });
            }
            for word in words {
                if !is_word(word) {
                    return Err(CorpusError::InvalidWord {
                        list,
                        word: word.clone(),
                    });
                }
                if !seen.insert(word.as_str()) {
                    return Err(CorpusError::DuplicateWord { word: word.clone() });
                }
            }
        }

        if self.partitions.is_empty() {
            return Err(CorpusError::EmptyList { list: "partitions" });
        }
        let mut partitions = HashSet::new();
        for partition in &self.partitions {
            if !partitions.insert(partition) {
                return Err(CorpusError::DuplicatePartition {
                    partition: partition.clone(),
                });
            }
        }
        Ok(())
    }

    /// Number of distinct labels the corpus can produce.
    pub fn combinations(&self) -> usize {
        self.adjectives
            .len()
            .saturating_mul(self.descriptors.len())
            .saturating_mul(self.nouns.len())
    }

    /// Compose the label at the given list positions.
    pub fn label_at(
        &self,
        adjective: usize,
        descriptor: usize,
        noun: usize,
    ) -> Option<Result<Label, LabelError>> {
        let adjective = self.adjectives.get(adjective)?;
        let descriptor = self.descriptors.get(descriptor)?;
        let noun = self.nouns.get(noun)?;
        Some(Label::compose(adjective, descriptor, noun))
    }

    /// True when every component of the label comes from the matching list.
    pub fn contains_label(&self, label: &Label) -> bool {
        let (adjective, descriptor, noun) = label.components();
        self.adjectives.iter().any(|w| w == adjective)
            && self.descriptors.iter().any(|w| w == descriptor)
            && self.nouns.iter().any(|w| w == noun)
    }

    pub fn has_partition(&self, partition: &Partition) -> bool {
        self.partitions.contains(partition)
    }

    pub fn partition_at(&self, index: usize) -> Option<&Partition> {
        self.partitions.get(index)
    }
}

impl Default for WordCorpus {
    fn default() -> Self {
        Self::builtin()
    }
}

const BUILTIN_ADJECTIVES: &[&str] = &[
    "swift", "brave", "wise", "calm", "bold", "kind", "pure", "wild", "soft", "fierce",
    "bright", "dark", "warm", "cool", "fresh", "deep", "high", "low", "fast", "slow",
    "rich", "poor", "young", "old", "new", "rare", "fine", "true", "fair", "free",
    "safe", "sure", "real", "full", "open", "wide", "long", "short", "hard", "keen",
    "loud", "quiet", "sweet", "sour", "sharp", "dull", "smooth", "rough", "light", "heavy",
];

const BUILTIN_DESCRIPTORS: &[&str] = &[
    "mighty", "noble", "royal", "sacred", "divine", "eternal", "cosmic", "stellar", "lunar",
    "solar", "oceanic", "mountain", "forest", "desert", "river", "valley", "crystal", "golden",
    "silver", "bronze", "ancient", "modern", "future", "past", "present", "timeless", "endless",
    "boundless", "limitless", "infinite", "mystic", "magic", "secret", "hidden", "radiant",
    "holy", "blessed", "cursed", "fabled", "legendary", "celestial", "terrestrial", "aquatic",
    "aerial", "ethereal", "astral", "verdant", "planetary", "galactic", "universal",
];

const BUILTIN_NOUNS: &[&str] = &[
    "dragon", "phoenix", "griffin", "unicorn", "pegasus", "serpent", "tiger", "lion", "eagle",
    "wolf", "bear", "deer", "fox", "owl", "hawk", "swan", "dove", "raven", "crane", "falcon",
    "star", "moon", "sun", "earth", "mars", "jupiter", "saturn", "neptune", "pluto", "comet",
    "ocean", "brook", "lake", "sea", "bay", "gulf", "cove", "port", "harbor", "shore",
    "glacier", "canyon", "grove", "dune", "plains", "cave", "cliff", "peak", "ridge", "summit",
];

const BUILTIN_PARTITIONS: &[&str] = &[
    "Automata",
    "BOB",
    "Base",
    "Binary",
    "Cyber",
    "Ethernity",
    "Funki",
    "HashKey-Chain",
    "Ink",
    "Lisk",
    "Lyra-Chain",
    "Metal-L2",
    "Mint",
    "Mode",
    "OP",
    "Orderly",
    "Polynomial",
    "RACE",
    "Redstone",
    "Settlus",
    "Shape",
    "SnaxChain",
    "Soneium",
    "Superseed",
    "Swan-Chain",
    "Swellchain",
    "Unichain",
    "World-Chain",
    "Xterio-Chain",
    "Zora",
    "Arena-z",
];
