use std::fmt;

use thiserror::Error;

/// The step of a sync operation an I/O failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStage {
    SourceRead,
    DestinationWrite,
    DestinationRead,
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStage::SourceRead => write!(f, "source read"),
            TransferStage::DestinationWrite => write!(f, "destination write"),
            TransferStage::DestinationRead => write!(f, "destination read"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{stage} failed for {key}: {message}")]
    Transfer {
        stage: TransferStage,
        key: String,
        message: String,
    },

    #[error("checksum failed for {key}: {source}")]
    Checksum {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Tag a capability error with the sync stage and key it belongs to.
    pub fn transfer(stage: TransferStage, key: &str, err: impl fmt::Display) -> Self {
        SyncError::Transfer {
            stage,
            key: key.to_string(),
            message: err.to_string(),
        }
    }

    /// Whether re-submitting the same key in a later run may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transfer { .. }
            | SyncError::Checksum { .. }
            | SyncError::NotFound { .. }
            | SyncError::Storage(_)
            | SyncError::Io(_) => true,
            SyncError::InvalidArgument(_) | SyncError::Task(_) => false,
        }
    }
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(e: tokio::task::JoinError) -> Self {
        SyncError::Task(e.to_string())
    }
}
