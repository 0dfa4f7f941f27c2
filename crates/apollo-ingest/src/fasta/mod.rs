//! FASTA tokenizing and chunking
//!
//! - [`Tokenizer`] turns a decompressed byte stream into [`FastaEvent`]s
//! - [`ChunkAccumulator`] turns events into reference sequences and
//!   fixed-size sequence chunks ([`ChunkOp`])

pub mod chunker;
pub mod tokenizer;

pub use chunker::{ChunkAccumulator, ChunkOp, RecordContext};
pub use tokenizer::{Token, Tokenizer};

use thiserror::Error;

/// One token of a FASTA stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FastaEvent {
    /// `>name description`
    Header { name: String, description: String },
    /// Residue text of one line, trailing whitespace removed
    Data(String),
    /// Emitted once after the last line
    End,
}

#[derive(Error, Debug)]
pub enum FastaError {
    #[error("line {line}: sequence data before any header")]
    SequenceBeforeHeader { line: u64 },

    #[error("line {line}: header without a sequence name")]
    EmptyHeader { line: u64 },

    #[error("failed to read FASTA stream: {0}")]
    Io(#[from] std::io::Error),
}
