//! Version identifier type

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A point in a wavelet's history plus the server's integrity tag for it.
///
/// Two versions are equal only if both the sequence number and the tag match.
/// Ordering is by sequence number first, so versions sort along history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionId {
    /// Number of operations applied to the wavelet so far
    pub sequence: u64,

    /// Opaque integrity tag issued by the server (empty when unsigned)
    pub tag: Vec<u8>,
}

impl VersionId {
    /// Create a version with an explicit tag
    pub fn new(sequence: u64, tag: impl Into<Vec<u8>>) -> Self {
        Self {
            sequence,
            tag: tag.into(),
        }
    }

    /// Create a version with no integrity tag
    pub fn unsigned(sequence: u64) -> Self {
        Self {
            sequence,
            tag: Vec::new(),
        }
    }

    /// Whether the version carries an integrity tag
    pub fn is_signed(&self) -> bool {
        !self.tag.is_empty()
    }

    /// Whether two versions name the same point in history but disagree on
    /// the tag. Unsigned versions never conflict.
    pub fn conflicts_with(&self, other: &VersionId) -> bool {
        self.sequence == other.sequence
            && self.is_signed()
            && other.is_signed()
            && self.tag != other.tag
    }
}

impl PartialOrd for VersionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sequence
            .cmp(&other.sequence)
            .then_with(|| self.tag.cmp(&other.tag))
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tag.is_empty() {
            write!(f, "{}", self.sequence)
        } else {
            write!(f, "{}:{}", self.sequence, hex::encode(&self.tag))
        }
    }
}
