//! Scripted channel scenarios
//!
//! Versions are plain sequence numbers; the runner attaches tags.
//!
//! ```toml
//! name = "late ack"
//!
//! [[steps]]
//! kind = "connect"
//! version = 57
//!
//! [[steps]]
//! kind = "submit"
//! ops = 5
//!
//! [[steps]]
//! kind = "ack"
//! ops_applied = 5
//! version = 62
//! ```

use super::errors::{SimError, SimResult};
use crate::core_channel::ReturnCode;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One scripted input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// Connection notice; `version` is the last modified version
    Connect {
        version: u64,
        connect_version: Option<u64>,
        committed: Option<u64>,
        unacknowledged: Option<u64>,
        #[serde(default)]
        catch_up_ops: usize,
    },
    /// Update carrying one server delta and optionally a commit notice
    ServerDelta {
        applied_at: u64,
        ops: usize,
        committed: Option<u64>,
    },
    /// Update carrying only a commit notice
    Commit { version: u64 },
    /// Client submission; targets the expected version unless given
    Submit { ops: usize, target: Option<u64> },
    /// Ack for the oldest unanswered submission
    Ack { ops_applied: usize, version: u64 },
    /// Nack for the oldest unanswered submission
    Nack {
        version: u64,
        code: ReturnCode,
        #[serde(default)]
        message: String,
    },
    /// Reset the channel; the receiver stays attached unless `detach`
    Reset {
        #[serde(default)]
        detach: bool,
    },
}

impl Step {
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Connect { .. } => "connect",
            Step::ServerDelta { .. } => "server_delta",
            Step::Commit { .. } => "commit",
            Step::Submit { .. } => "submit",
            Step::Ack { .. } => "ack",
            Step::Nack { .. } => "nack",
            Step::Reset { .. } => "reset",
        }
    }
}

/// A named list of steps, with the receiver event kinds it should produce
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,

    /// Seed for version tags; defaults to the scenario name
    pub wavelet: Option<String>,

    #[serde(default)]
    pub steps: Vec<Step>,

    /// Receiver event kinds, in order, across the whole run
    pub expect: Option<Vec<String>>,
}

impl Scenario {
    pub fn from_toml_str(s: &str) -> SimResult<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load a `.json` file as JSON and anything else as TOML
    pub fn from_file(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_toml_str(&contents)
        }
    }

    pub fn seed(&self) -> &str {
        self.wavelet.as_deref().unwrap_or(&self.name)
    }
}
