//! Participant addresses

use super::errors::{OperationError, OperationResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A wavelet participant, addressed as `name@domain`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Parse and normalize an address
    pub fn new(address: impl AsRef<str>) -> OperationResult<Self> {
        let normalized = address.as_ref().trim().to_lowercase();
        let mut parts = normalized.splitn(2, '@');
        let name = parts.next().unwrap_or_default();
        let domain = parts.next().unwrap_or_default();

        if name.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(OperationError::InvalidParticipant(
                address.as_ref().to_string(),
            ));
        }

        Ok(Self(normalized))
    }

    /// Wrap an address that is already known to be valid
    pub fn new_unchecked(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn address(&self) -> &str {
        &self.0
    }

    /// Domain part of the address
    pub fn domain(&self) -> &str {
        self.0.split_once('@').map(|(_, d)| d).unwrap_or("")
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
