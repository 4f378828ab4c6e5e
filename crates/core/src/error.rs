//! Error types shared by the stores, the instruction model and delivery.

use std::path::PathBuf;
use uuid::Uuid;

/// Failures of a file-backed [`Store`](crate::store::Store).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} '{key}' not found")]
    NotFound { kind: &'static str, key: String },
    #[error("{kind} '{key}' already exists")]
    AlreadyExists { kind: &'static str, key: String },
    #[error("invalid {kind}: {reason}")]
    Validation { kind: &'static str, reason: String },
    #[error("failed to persist {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to remove file {}: {source}", path.display())]
    FileRemoval {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Failures while resolving the payload of an instruction.
#[derive(Debug, thiserror::Error)]
pub enum InstructionError {
    #[error("content unavailable: {0}")]
    ContentUnavailable(String),
}

/// No store could turn an identifier into an instruction.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("can't find an instruction with the ID {0}")]
    NotFound(Uuid),
}

/// Failures of [`deliver`](crate::delivery::deliver).
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("no robot connection, the robot must initiate it first")]
    ConnectionUnavailable,
    #[error(
        "can't get content out of an instruction and its name is missing, which makes it ambiguous: {0}"
    )]
    Ambiguous(#[source] InstructionError),
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write frame: {0}")]
    Transport(#[source] anyhow::Error),
}
