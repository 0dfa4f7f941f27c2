//! Ingestion error types
//!
//! Errors here are things the dispatcher has to react to. Skips (file
//! already ingested, assembly already present) are not errors; they are
//! reported through [`crate::coordinator::FileOutcome`].

use std::path::PathBuf;
use thiserror::Error;

use crate::fasta::FastaError;
use crate::store::StoreError;

/// Result type alias for per-file ingestion
pub type IngestResult<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Failed to compress {}: {source}", path.display())]
    Compression {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed FASTA: {0}")]
    Fasta(#[from] FastaError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tokio::task::JoinError> for IngestError {
    fn from(err: tokio::task::JoinError) -> Self {
        IngestError::Internal(format!("blocking task failed: {}", err))
    }
}
