//! Session layer errors

use crate::core_ops::OperationError;
use thiserror::Error;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("View is a static snapshot")]
    NotLive,

    #[error("View is already live at version {0}")]
    AlreadyLive(u64),

    #[error("Version mismatch: view at {view}, input at {input}")]
    VersionMismatch { view: u64, input: u64 },

    #[error("Operation failed: {0}")]
    Operation(#[from] OperationError),
}
