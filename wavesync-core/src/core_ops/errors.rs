//! Error types for wavelet operations

use thiserror::Error;

/// Result type for operation application
pub type OperationResult<T> = Result<T, OperationError>;

/// Errors raised when an operation does not fit the state it is applied to
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    /// Participant address is malformed
    #[error("Invalid participant address: {0}")]
    InvalidParticipant(String),

    /// Participant is already on the wavelet
    #[error("Participant already present: {0}")]
    ParticipantExists(String),

    /// Participant is not on the wavelet
    #[error("Participant not present: {0}")]
    ParticipantMissing(String),

    /// Insert position lies outside the participant list
    #[error("Participant position {position} out of range (len {len})")]
    InvalidPosition { position: usize, len: usize },

    /// Document operation does not span the target document
    #[error("Document mismatch in blip {blip}: {reason}")]
    DocumentMismatch { blip: String, reason: String },

    /// Metadata precondition failed
    #[error("Metadata mismatch for key {key}: expected {expected:?}, found {actual:?}")]
    MetadataMismatch {
        key: String,
        expected: Option<String>,
        actual: Option<String>,
    },

    /// Delta versions and operations disagree
    #[error("Invalid delta: {0}")]
    InvalidDelta(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<bincode::Error> for OperationError {
    fn from(e: bincode::Error) -> Self {
        OperationError::Serialization(e.to_string())
    }
}
