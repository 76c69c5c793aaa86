//! Submission return codes and their protocol-level classification

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Result code of a delta submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnCode {
    Ok,
    BadRequest,
    InternalError,
    NotAuthorized,
    VersionError,
    InvalidOperation,
    SchemaViolation,
    SizeLimitExceeded,
    PolicyViolation,
    Quarantined,
    TooOld,
    NotExists,
    AlreadyExists,
}

impl ReturnCode {
    pub const ALL: [ReturnCode; 13] = [
        ReturnCode::Ok,
        ReturnCode::BadRequest,
        ReturnCode::InternalError,
        ReturnCode::NotAuthorized,
        ReturnCode::VersionError,
        ReturnCode::InvalidOperation,
        ReturnCode::SchemaViolation,
        ReturnCode::SizeLimitExceeded,
        ReturnCode::PolicyViolation,
        ReturnCode::Quarantined,
        ReturnCode::TooOld,
        ReturnCode::NotExists,
        ReturnCode::AlreadyExists,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnCode::Ok => "OK",
            ReturnCode::BadRequest => "BAD_REQUEST",
            ReturnCode::InternalError => "INTERNAL_ERROR",
            ReturnCode::NotAuthorized => "NOT_AUTHORIZED",
            ReturnCode::VersionError => "VERSION_ERROR",
            ReturnCode::InvalidOperation => "INVALID_OPERATION",
            ReturnCode::SchemaViolation => "SCHEMA_VIOLATION",
            ReturnCode::SizeLimitExceeded => "SIZE_LIMIT_EXCEEDED",
            ReturnCode::PolicyViolation => "POLICY_VIOLATION",
            ReturnCode::Quarantined => "QUARANTINED",
            ReturnCode::TooOld => "TOO_OLD",
            ReturnCode::NotExists => "NOT_EXISTS",
            ReturnCode::AlreadyExists => "ALREADY_EXISTS",
        }
    }

    /// Parse the wire name of a code, case-insensitively
    pub fn from_str(s: &str) -> Option<Self> {
        let upper = s.trim().to_uppercase();
        Self::ALL.iter().copied().find(|code| code.as_str() == upper)
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ReturnCode::Ok)
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Code plus human-readable detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnStatus {
    pub code: ReturnCode,
    pub message: String,
}

impl ReturnStatus {
    pub fn ok() -> Self {
        Self {
            code: ReturnCode::Ok,
            message: String::new(),
        }
    }

    pub fn new(code: ReturnCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code.is_ok()
    }
}

impl fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

/// Whether the caller can recover from an error by resynchronizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recoverable {
    Recoverable,
    NotRecoverable,
}

/// Table of nack codes that call for a resync rather than a plain
/// application-level rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NackClassifier {
    recoverable: BTreeSet<ReturnCode>,
}

impl NackClassifier {
    pub fn new(recoverable: impl IntoIterator<Item = ReturnCode>) -> Self {
        Self {
            recoverable: recoverable
                .into_iter()
                .filter(|code| !code.is_ok())
                .collect(),
        }
    }

    pub fn classify(&self, code: ReturnCode) -> Recoverable {
        if self.recoverable.contains(&code) {
            Recoverable::Recoverable
        } else {
            Recoverable::NotRecoverable
        }
    }

    pub fn recoverable_codes(&self) -> impl Iterator<Item = ReturnCode> + '_ {
        self.recoverable.iter().copied()
    }
}

impl Default for NackClassifier {
    fn default() -> Self {
        Self::new([ReturnCode::TooOld])
    }
}
