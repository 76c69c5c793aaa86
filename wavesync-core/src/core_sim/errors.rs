//! Scenario loading and replay errors

use crate::core_ops::OperationError;
use std::path::PathBuf;
use thiserror::Error;

pub type SimResult<T> = Result<T, SimError>;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Failed to read scenario {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML scenario: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid JSON scenario: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Step {step}: no submission awaiting a response")]
    NoPendingSubmission { step: usize },

    #[error("Step {step}: {source}")]
    Operation {
        step: usize,
        #[source]
        source: OperationError,
    },
}
