//! Apollo FASTA ingestion pipeline
//!
//! Loads FASTA assemblies into a document store. Each input file is
//! compressed to a checksum-named artifact, parsed into reference sequences
//! and fixed-size sequence chunks, and written together with a change
//! record as one unit of work.
//!
//! - [`compress`]: streaming gzip + digest
//! - [`fasta`]: tokenizer and chunk accumulator
//! - [`coordinator`]: the per-file pipeline
//! - [`dispatcher`]: fan-out over an input directory
//! - [`store`]: document store interface with PostgreSQL and in-memory backends
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

pub mod cli;
pub mod compress;
pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod fasta;
pub mod store;

pub use coordinator::{FileOutcome, IngestSummary, IngestionCoordinator, SkipReason};
pub use dispatcher::{run, RunSummary};
pub use error::{IngestError, IngestResult};
