use serde::{Deserialize, Serialize};
use std::fmt;

/// A content digest, lowercase hex. Compared as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(pub String);

impl Checksum {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return a short prefix (first 8 chars) for display.
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Checksum {
    fn from(s: String) -> Self {
        Checksum(s)
    }
}

/// One object key queued for migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub key: String,
}

impl WorkItem {
    pub fn new(key: impl Into<String>) -> Self {
        WorkItem { key: key.into() }
    }
}

/// How a single sync operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// Bytes were copied; `verified` is the read-back checksum comparison.
    Synced { verified: bool },
    /// An I/O or checksum step failed.
    Failed { error: String },
}

/// Result of migrating one key, produced exactly once per [`WorkItem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub key: String,
    pub status: OutcomeStatus,
}

impl SyncOutcome {
    pub fn synced(key: impl Into<String>, verified: bool) -> Self {
        SyncOutcome {
            key: key.into(),
            status: OutcomeStatus::Synced { verified },
        }
    }

    pub fn failed(key: impl Into<String>, error: impl fmt::Display) -> Self {
        let mut error = error.to_string();
        if error.is_empty() {
            error.push_str("unknown error");
        }
        SyncOutcome {
            key: key.into(),
            status: OutcomeStatus::Failed { error },
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.status, OutcomeStatus::Synced { .. })
    }

    pub fn verified(&self) -> bool {
        matches!(self.status, OutcomeStatus::Synced { verified: true })
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            OutcomeStatus::Failed { error } => Some(error),
            OutcomeStatus::Synced { .. } => None,
        }
    }
}

/// Content hash used for transfer verification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    /// Matches the ETag S3 reports for single-part uploads.
    #[default]
    Md5,
    Sha256,
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChecksumAlgorithm::Md5 => write!(f, "md5"),
            ChecksumAlgorithm::Sha256 => write!(f, "sha256"),
        }
    }
}

/// What a resume run does with records that synced but failed verification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnverifiedPolicy {
    /// Treat `ok,false` as migrated and leave it alone.
    #[default]
    Skip,
    /// Queue `ok,false` records again.
    Retry,
}
