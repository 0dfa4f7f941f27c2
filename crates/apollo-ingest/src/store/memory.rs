//! In-process document store
//!
//! Used for `--dry-run` and by the test suite. A unit of work buffers its
//! writes and applies them under one lock on commit, so other sessions never
//! observe a partially ingested assembly. Uniqueness of `files` and
//! `assemblies` is checked both when a write is buffered and again at commit,
//! which is where two racing units are told apart.

use std::collections::HashMap;
use std::sync::Arc;

use apollo_common::types::{Assembly, ChangeRecord, ReferenceSequence, SequenceChunk, SourceFile};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{DocumentStore, StoreError, StoreResult, StoreSession, StoreUnit};

#[derive(Debug, Default)]
struct Collections {
    files: Vec<SourceFile>,
    assemblies: Vec<Assembly>,
    refseqs: Vec<ReferenceSequence>,
    chunks: Vec<SequenceChunk>,
    changes: Vec<ChangeRecord>,
    counters: HashMap<String, i64>,
}

impl Collections {
    fn has_file(&self, basename: &str, checksum: &str) -> bool {
        self.files
            .iter()
            .any(|f| f.basename == basename && f.checksum == checksum)
    }

    fn has_assembly(&self, name: &str) -> bool {
        self.assemblies.iter().any(|a| a.name == name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn files(&self) -> Vec<SourceFile> {
        self.inner.lock().await.files.clone()
    }

    pub async fn assemblies(&self) -> Vec<Assembly> {
        self.inner.lock().await.assemblies.clone()
    }

    pub async fn refseqs(&self) -> Vec<ReferenceSequence> {
        self.inner.lock().await.refseqs.clone()
    }

    /// Chunks of one reference sequence ordered by index
    pub async fn chunks_for(&self, refseq_id: Uuid) -> Vec<SequenceChunk> {
        let guard = self.inner.lock().await;
        let mut chunks: Vec<SequenceChunk> = guard
            .chunks
            .iter()
            .filter(|c| c.refseq_id == refseq_id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.index);
        chunks
    }

    pub async fn chunk_count(&self) -> usize {
        self.inner.lock().await.chunks.len()
    }

    pub async fn changes(&self) -> Vec<ChangeRecord> {
        self.inner.lock().await.changes.clone()
    }

    /// Current value of a counter, if it has ever been incremented
    pub async fn counter(&self, counter_id: &str) -> Option<i64> {
        self.inner.lock().await.counters.get(counter_id).copied()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn session(&self) -> StoreResult<Box<dyn StoreSession>> {
        Ok(Box::new(MemorySession {
            inner: Arc::clone(&self.inner),
        }))
    }

    async fn migrate(&self) -> StoreResult<()> {
        Ok(())
    }
}

struct MemorySession {
    inner: Arc<Mutex<Collections>>,
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn find_file(&mut self, basename: &str, checksum: &str) -> StoreResult<Option<SourceFile>> {
        let guard = self.inner.lock().await;
        Ok(guard
            .files
            .iter()
            .find(|f| f.basename == basename && f.checksum == checksum)
            .cloned())
    }

    async fn find_assembly(&mut self, name: &str) -> StoreResult<Option<Assembly>> {
        let guard = self.inner.lock().await;
        Ok(guard.assemblies.iter().find(|a| a.name == name).cloned())
    }

    async fn next_sequence_value(&mut self, counter_id: &str) -> StoreResult<i64> {
        let mut guard = self.inner.lock().await;
        let value = guard.counters.entry(counter_id.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn begin(&mut self) -> StoreResult<Box<dyn StoreUnit + '_>> {
        Ok(Box::new(MemoryUnit {
            inner: Arc::clone(&self.inner),
            pending: Collections::default(),
        }))
    }
}

struct MemoryUnit {
    inner: Arc<Mutex<Collections>>,
    pending: Collections,
}

fn duplicate_file(file: &SourceFile) -> StoreError {
    StoreError::Duplicate {
        collection: "files",
        key: format!("{}@{}", file.basename, file.checksum),
    }
}

fn duplicate_assembly(assembly: &Assembly) -> StoreError {
    StoreError::Duplicate {
        collection: "assemblies",
        key: assembly.name.clone(),
    }
}

#[async_trait]
impl StoreUnit for MemoryUnit {
    async fn insert_file(&mut self, file: &SourceFile) -> StoreResult<()> {
        let exists = self.inner.lock().await.has_file(&file.basename, &file.checksum);
        if exists || self.pending.has_file(&file.basename, &file.checksum) {
            return Err(duplicate_file(file));
        }
        self.pending.files.push(file.clone());
        Ok(())
    }

    async fn insert_assembly(&mut self, assembly: &Assembly) -> StoreResult<()> {
        let exists = self.inner.lock().await.has_assembly(&assembly.name);
        if exists || self.pending.has_assembly(&assembly.name) {
            return Err(duplicate_assembly(assembly));
        }
        self.pending.assemblies.push(assembly.clone());
        Ok(())
    }

    async fn insert_refseq(&mut self, refseq: &ReferenceSequence) -> StoreResult<()> {
        self.pending.refseqs.push(refseq.clone());
        Ok(())
    }

    async fn set_refseq_length(&mut self, refseq_id: Uuid, length: i64) -> StoreResult<()> {
        let refseq = self
            .pending
            .refseqs
            .iter_mut()
            .find(|r| r.id == refseq_id)
            .ok_or_else(|| StoreError::NotFound {
                collection: "refseqs",
                key: refseq_id.to_string(),
            })?;
        refseq.length = length;
        Ok(())
    }

    async fn insert_chunk(&mut self, chunk: &SequenceChunk) -> StoreResult<()> {
        self.pending.chunks.push(chunk.clone());
        Ok(())
    }

    async fn insert_change(&mut self, change: &ChangeRecord) -> StoreResult<()> {
        self.pending.changes.push(change.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryUnit { inner, pending } = *self;
        let mut guard = inner.lock().await;

        // Re-check under the lock; another unit may have committed since.
        if let Some(file) = pending
            .files
            .iter()
            .find(|f| guard.has_file(&f.basename, &f.checksum))
        {
            return Err(duplicate_file(file));
        }
        if let Some(assembly) = pending.assemblies.iter().find(|a| guard.has_assembly(&a.name)) {
            return Err(duplicate_assembly(assembly));
        }

        debug!(
            files = pending.files.len(),
            assemblies = pending.assemblies.len(),
            refseqs = pending.refseqs.len(),
            chunks = pending.chunks.len(),
            changes = pending.changes.len(),
            "Committing in-memory unit"
        );

        guard.files.extend(pending.files);
        guard.assemblies.extend(pending.assemblies);
        guard.refseqs.extend(pending.refseqs);
        guard.chunks.extend(pending.chunks);
        guard.changes.extend(pending.changes);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
