//! Operation contexts

use super::participant::ParticipantId;
use crate::core_version::VersionId;
use serde::{Deserialize, Serialize};

/// Authorship and versioning metadata attached to every operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationContext {
    /// Participant who produced the operation
    pub creator: ParticipantId,

    /// Milliseconds since the epoch
    pub timestamp: u64,

    /// How far the wavelet version advances when the operation applies
    pub version_increment: u64,

    /// Version reached after applying, when the server has assigned one
    pub hashed_version: Option<VersionId>,
}

impl OperationContext {
    pub fn new(creator: ParticipantId, timestamp: u64) -> Self {
        Self {
            creator,
            timestamp,
            version_increment: 1,
            hashed_version: None,
        }
    }

    pub fn with_hashed_version(mut self, version: VersionId) -> Self {
        self.hashed_version = Some(version);
        self
    }

    /// Context of an inverse operation: same author, the reversal's
    /// timestamp and version.
    pub fn reversed(&self, reversal: &ReversalContext) -> Self {
        Self {
            creator: self.creator.clone(),
            timestamp: reversal.timestamp,
            version_increment: 1,
            hashed_version: reversal.hashed_version.clone(),
        }
    }
}

/// When and at which version an inverse operation is produced.
///
/// The author of an inverse is always the author of the forward operation,
/// so that contributor bookkeeping undoes cleanly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReversalContext {
    pub timestamp: u64,
    pub hashed_version: Option<VersionId>,
}

impl ReversalContext {
    pub fn new(timestamp: u64) -> Self {
        Self {
            timestamp,
            hashed_version: None,
        }
    }

    pub fn at_version(mut self, version: VersionId) -> Self {
        self.hashed_version = Some(version);
        self
    }
}
