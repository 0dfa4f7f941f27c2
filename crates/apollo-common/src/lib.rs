//! Apollo Loader Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the Apollo loader workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`LoaderError`] and the crate [`Result`] alias
//! - **Checksums**: streaming digests used to content-address artifacts
//! - **Logging**: `tracing` subscriber setup shared by every binary
//! - **Types**: the document-store entities written during ingestion
//!
//! # Example
//!
//! ```
//! use apollo_common::checksum::StreamingHasher;
//! use apollo_common::types::ChecksumAlgorithm;
//!
//! let mut hasher = StreamingHasher::new(ChecksumAlgorithm::Sha256);
//! for block in [b">seq1\n".as_slice(), b"ACGT\n"] {
//!     hasher.update(block);
//! }
//! let digest = hasher.finalize_hex();
//! assert_eq!(digest.len(), 64);
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{LoaderError, Result};
