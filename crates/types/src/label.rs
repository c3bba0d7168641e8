//! Generated labels, partitions and the keys they form together.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Separator joining the three label components.
pub const LABEL_SEPARATOR: char = '-';
/// Longest label or partition accepted by the parsers.
pub const MAX_NAME_LENGTH: usize = 96;

/// Errors raised while parsing labels and partitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("label must have the form adjective-descriptor-noun: {label}")]
    InvalidShape { label: String },
    #[error("label component {component:?} must be lowercase ascii alphanumeric")]
    InvalidComponent { component: String },
    #[error("partition identifier is invalid: {partition:?}")]
    InvalidPartition { partition: String },
    #[error("name exceeds {MAX_NAME_LENGTH} characters")]
    TooLong,
}

/// A generated `adjective-descriptor-noun` label, always lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Label(String);

impl Label {
    /// Join three corpus words into a label.
    pub fn compose(adjective: &str, descriptor: &str, noun: &str) -> Result<Self, LabelError> {
        Self::parse(&format!(
            "{adjective}{LABEL_SEPARATOR}{descriptor}{LABEL_SEPARATOR}{noun}"
        ))
    }

    /// Parse and case-normalise a label.
    pub fn parse(raw: &str) -> Result<Self, LabelError> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.len() > MAX_NAME_LENGTH {
            return Err(LabelError::TooLong);
        }

        let parts: Vec<&str> = normalized.split(LABEL_SEPARATOR).collect();
        if parts.len() != 3 {
            return Err(LabelError::InvalidShape { label: normalized });
        }
        for part in &parts {
            if !is_word(part) {
                return Err(LabelError::InvalidComponent {
                    component: (*part).to_string(),
                });
            }
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split the label back into `(adjective, descriptor, noun)`.
    pub fn components(&self) -> (&str, &str, &str) {
        let mut parts = self.0.splitn(3, LABEL_SEPARATOR);
        let adjective = parts.next().unwrap_or_default();
        let descriptor = parts.next().unwrap_or_default();
        let noun = parts.next().unwrap_or_default();
        (adjective, descriptor, noun)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Label> for String {
    fn from(value: Label) -> Self {
        value.0
    }
}

impl TryFrom<String> for Label {
    type Error = LabelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Label::parse(&value)
    }
}

/// A namespace bucket. Case is preserved (`World-Chain`), comparison is exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Partition(String);

impl Partition {
    pub fn new(raw: impl Into<String>) -> Result<Self, LabelError> {
        let value: String = raw.into();
        let trimmed = value.trim();
        if trimmed.len() > MAX_NAME_LENGTH {
            return Err(LabelError::TooLong);
        }
        let valid = !trimmed.is_empty()
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(LabelError::InvalidPartition { partition: value });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Partition> for String {
    fn from(value: Partition) -> Self {
        value.0
    }
}

impl TryFrom<String> for Partition {
    type Error = LabelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Partition::new(value)
    }
}

/// Uniqueness key of a domain record: a label is unique within its partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DomainKey {
    pub partition: Partition,
    pub label: Label,
}

impl DomainKey {
    pub fn new(partition: Partition, label: Label) -> Self {
        Self { partition, label }
    }

    /// Render `label.partition.suffix`.
    pub fn full_name(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            format!("{}.{}", self.label, self.partition)
        } else {
            format!("{}.{}.{}", self.label, self.partition, suffix)
        }
    }

    /// Stable byte key used by persistent stores.
    pub fn storage_key(&self) -> Vec<u8> {
        format!("{}/{}", self.partition, self.label).into_bytes()
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.label, self.partition)
    }
}

/// True for a non-empty lowercase ascii alphanumeric word.
pub fn is_word(word: &str) -> bool {
    !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalises_case_and_whitespace() {
        let label = Label::parse("  Swift-NOBLE-dragon ").unwrap();
        assert_eq!(label.as_str(), "swift-noble-dragon");
        assert_eq!(label.components(), ("swift", "noble", "dragon"));
    }

    #[test]
    fn parse_rejects_wrong_shape() {
        assert!(matches!(
            Label::parse("swift-dragon"),
            Err(LabelError::InvalidShape { .. })
        ));
        assert!(matches!(
            Label::parse("a-b-c-d"),
            Err(LabelError::InvalidShape { .. })
        ));
        assert!(matches!(
            Label::parse("swift--dragon"),
            Err(LabelError::InvalidComponent { .. })
        ));
        assert!(matches!(
            Label::parse("swift-no.ble-dragon"),
            Err(LabelError::InvalidComponent { .. })
        ));
    }

    #[test]
    fn compose_matches_parse() {
        let label = Label::compose("swift", "noble", "dragon").unwrap();
        assert_eq!(label, Label::parse("swift-noble-dragon").unwrap());
    }

    #[test]
    fn partition_keeps_case() {
        let partition = Partition::new("World-Chain").unwrap();
        assert_eq!(partition.as_str(), "World-Chain");
        assert_ne!(partition, Partition::new("world-chain").unwrap());
        assert!(Partition::new("").is_err());
        assert!(Partition::new("op.main").is_err());
    }

    #[test]
    fn full_name_includes_suffix() {
        let key = DomainKey::new(
            Partition::new("OP").unwrap(),
            Label::parse("swift-noble-dragon").unwrap(),
        );
        assert_eq!(key.full_name("moniker.id"), "swift-noble-dragon.OP.moniker.id");
        assert_eq!(key.full_name(""), "swift-noble-dragon.OP");
    }
}
