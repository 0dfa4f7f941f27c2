//! Error types shared across the loader

use thiserror::Error;

/// Result type alias for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Main error type for the loader
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file type: '{0}' (supported: fasta)")]
    UnsupportedFileType(String),

    #[error("Invalid checksum algorithm: {0}")]
    InvalidChecksumAlgorithm(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
