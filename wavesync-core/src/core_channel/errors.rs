//! Error types for the delta channel

use super::status::{Recoverable, ReturnStatus};
use thiserror::Error;

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors raised synchronously out of channel calls
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The caller broke the calling contract (send while disconnected or
    /// while a submission is outstanding)
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// A server delta does not start where the channel's history ends
    #[error("Version gap: expected version {expected}, delta applied at {applied_at}")]
    Gap { expected: u64, applied_at: u64 },

    /// The server echoed this client's own delta through the update path
    #[error("Own delta reflected back: versions {applied_at}..{resulting}")]
    ReflectedDelta { applied_at: u64, resulting: u64 },

    /// The server acknowledged a delta the channel already received as an update
    #[error("Ack for already-received delta: ack starts at {ack_start}, channel at {expected}")]
    AckForReceivedDelta { ack_start: u64, expected: u64 },

    /// Same version number, different integrity tag
    #[error("Integrity tag mismatch at version {sequence}")]
    IntegrityMismatch { sequence: u64 },

    /// Any other inconsistency in what the server sent
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// The channel hit a fatal error earlier and must be reset
    #[error("Channel failed; reset required")]
    Failed,

    /// The server rejected the outstanding submission
    #[error("Submission rejected ({status})")]
    Nack {
        status: ReturnStatus,
        recoverable: Recoverable,
    },
}

impl ChannelError {
    pub fn recoverable(&self) -> Recoverable {
        match self {
            ChannelError::Nack { recoverable, .. } => *recoverable,
            _ => Recoverable::NotRecoverable,
        }
    }

    /// Whether the error ends the channel's usefulness until `reset`
    pub fn is_fatal(&self) -> bool {
        match self {
            ChannelError::Precondition(_) => false,
            ChannelError::Nack { recoverable, .. } => *recoverable == Recoverable::NotRecoverable,
            _ => true,
        }
    }
}
