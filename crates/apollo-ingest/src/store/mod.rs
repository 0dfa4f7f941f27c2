//! Document store interface
//!
//! The pipeline only needs a handful of operations: exact-match lookups,
//! inserts, one length update, and an atomic counter increment. They are
//! split across three traits so that ownership mirrors the worker model:
//!
//! - [`DocumentStore`] is shared by the dispatcher and hands out sessions
//! - [`StoreSession`] is owned by exactly one task for one file
//! - [`StoreUnit`] groups every write for one assembly; nothing it writes is
//!   visible to other sessions until [`StoreUnit::commit`]

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

use apollo_common::types::{Assembly, ChangeRecord, ReferenceSequence, SequenceChunk, SourceFile};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("duplicate {collection} entry: {key}")]
    Duplicate { collection: &'static str, key: String },

    #[error("{collection} entry not found: {key}")]
    NotFound { collection: &'static str, key: String },

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Shared handle to a backing store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Acquire a session for one task. The session releases its resources
    /// when dropped, whether the task succeeded or not.
    async fn session(&self) -> StoreResult<Box<dyn StoreSession>>;

    /// Prepare collections and indexes.
    async fn migrate(&self) -> StoreResult<()>;
}

/// Task-local connection to the store
#[async_trait]
pub trait StoreSession: Send {
    async fn find_file(&mut self, basename: &str, checksum: &str) -> StoreResult<Option<SourceFile>>;

    async fn find_assembly(&mut self, name: &str) -> StoreResult<Option<Assembly>>;

    /// Atomically increment the named counter, creating it at 1 when absent,
    /// and return the new value.
    async fn next_sequence_value(&mut self, counter_id: &str) -> StoreResult<i64>;

    /// Start a unit of work on this session's connection.
    async fn begin(&mut self) -> StoreResult<Box<dyn StoreUnit + '_>>;
}

/// All-or-nothing group of writes
#[async_trait]
pub trait StoreUnit: Send {
    async fn insert_file(&mut self, file: &SourceFile) -> StoreResult<()>;

    async fn insert_assembly(&mut self, assembly: &Assembly) -> StoreResult<()>;

    async fn insert_refseq(&mut self, refseq: &ReferenceSequence) -> StoreResult<()>;

    async fn set_refseq_length(&mut self, refseq_id: Uuid, length: i64) -> StoreResult<()>;

    async fn insert_chunk(&mut self, chunk: &SequenceChunk) -> StoreResult<()>;

    async fn insert_change(&mut self, change: &ChangeRecord) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
