//! Per-file ingestion
//!
//! For one source file the coordinator:
//!
//! 1. compresses and hashes it into the artifact directory
//! 2. skips it when `(basename, checksum)` is already registered
//! 3. skips it when an assembly with the same name already exists
//! 4. allocates the next change sequence value
//! 5. writes the file, assembly, reference sequences, chunks and change
//!    record as one unit of work and commits it
//!
//! Any failure in step 5 rolls the unit back, so a file is either fully
//! visible in the store or not at all and a later run can retry it. The
//! lookups in steps 2 and 3 happen before the counter is touched; skipped
//! files never consume sequence values.
//!
//! Reading the artifact is blocking work. The tokenizer and chunk
//! accumulator run on the blocking pool and hand [`ChunkOp`]s to the async
//! writer through a bounded channel.

use std::fmt;
use std::path::{Path, PathBuf};

use apollo_common::types::{
    user_tag, Assembly, ChangeRecord, SourceFile, CHANGE_COUNTER_ID,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::compress::{open_decompressed, CompressedArtifact, Compressor};
use crate::error::{IngestError, IngestResult};
use crate::fasta::{ChunkAccumulator, ChunkOp, FastaError, RecordContext, Tokenizer};
use crate::store::{StoreError, StoreSession, StoreUnit};

/// Why a file was not ingested, without being a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A source file with the same basename and checksum is registered
    AlreadyIngested,
    /// An assembly with the same name exists
    AssemblyExists,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyIngested => write!(f, "already ingested"),
            SkipReason::AssemblyExists => write!(f, "assembly exists"),
        }
    }
}

/// What a committed ingestion wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub assembly: String,
    pub assembly_id: Uuid,
    pub checksum: String,
    pub artifact: PathBuf,
    pub sequence: i64,
    pub refseqs: u64,
    pub chunks: u64,
    pub residues: u64,
}

#[derive(Debug)]
pub enum FileOutcome {
    Ingested(IngestSummary),
    Skipped(SkipReason),
    Failed(IngestError),
}

impl FileOutcome {
    pub fn is_ingested(&self) -> bool {
        matches!(self, FileOutcome::Ingested(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, FileOutcome::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FileOutcome::Failed(_))
    }
}

#[derive(Debug, Default)]
struct WriteStats {
    refseqs: u64,
    chunks: u64,
    residues: u64,
}

/// Drives one file at a time through compression, parsing and the store
#[derive(Debug, Clone)]
pub struct IngestionCoordinator {
    compressor: Compressor,
    chunk_size: usize,
    channel_depth: usize,
}

impl IngestionCoordinator {
    pub fn new(compressor: Compressor, chunk_size: usize, channel_depth: usize) -> Self {
        Self {
            compressor,
            chunk_size: chunk_size.max(1),
            channel_depth: channel_depth.max(1),
        }
    }

    /// Ingest `path` using the caller's session. Never returns an error;
    /// failures are reported as [`FileOutcome::Failed`].
    pub async fn ingest_file(&self, path: &Path, session: &mut dyn StoreSession) -> FileOutcome {
        let file_name = display_name(path);
        let span = info_span!("ingest", file = %file_name);

        async {
            let outcome = match self.try_ingest(path, session).await {
                Ok(outcome) => outcome,
                Err(e) => FileOutcome::Failed(e),
            };

            match &outcome {
                FileOutcome::Ingested(summary) => info!(
                    assembly = %summary.assembly,
                    sequence = summary.sequence,
                    refseqs = summary.refseqs,
                    chunks = summary.chunks,
                    residues = summary.residues,
                    "Ingested assembly"
                ),
                FileOutcome::Skipped(reason) => info!(%reason, "Skipped file"),
                FileOutcome::Failed(e) => error!(error = %e, "Failed to ingest file"),
            }

            outcome
        }
        .instrument(span)
        .await
    }

    async fn try_ingest(&self, path: &Path, session: &mut dyn StoreSession) -> IngestResult<FileOutcome> {
        let artifact = self.compressor.compress(path).await?;
        let basename = display_name(path);
        let assembly_name = assembly_name(path);

        if session.find_file(&basename, &artifact.checksum).await?.is_some() {
            return Ok(FileOutcome::Skipped(SkipReason::AlreadyIngested));
        }

        if session.find_assembly(&assembly_name).await?.is_some() {
            return Ok(FileOutcome::Skipped(SkipReason::AssemblyExists));
        }

        let sequence = session.next_sequence_value(CHANGE_COUNTER_ID).await?;
        let user = user_tag(sequence);
        debug!(sequence, user = %user, "Allocated change sequence");

        let file = SourceFile::fasta(basename, artifact.checksum.clone());
        let assembly = Assembly::new(assembly_name, user);
        let change = ChangeRecord::add_assembly_from_file(&assembly, &file, sequence);

        let mut unit = session.begin().await?;
        let written = self
            .write_unit(unit.as_mut(), &artifact, &file, &assembly, &change)
            .await;

        let result = match written {
            Ok(stats) => unit.commit().await.map(|()| stats).map_err(IngestError::from),
            Err(e) => {
                if let Err(rollback_err) = unit.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            },
        };

        match result {
            Ok(stats) => Ok(FileOutcome::Ingested(IngestSummary {
                assembly: assembly.name,
                assembly_id: assembly.id,
                checksum: artifact.checksum,
                artifact: artifact.path,
                sequence,
                refseqs: stats.refseqs,
                chunks: stats.chunks,
                residues: stats.residues,
            })),
            // Another worker committed the same file or assembly first.
            Err(IngestError::Store(StoreError::Duplicate { collection, .. })) if collection == "files" => {
                Ok(FileOutcome::Skipped(SkipReason::AlreadyIngested))
            },
            Err(IngestError::Store(StoreError::Duplicate { collection, .. }))
                if collection == "assemblies" =>
            {
                Ok(FileOutcome::Skipped(SkipReason::AssemblyExists))
            },
            Err(e) => Err(e),
        }
    }

    async fn write_unit(
        &self,
        unit: &mut dyn StoreUnit,
        artifact: &CompressedArtifact,
        file: &SourceFile,
        assembly: &Assembly,
        change: &ChangeRecord,
    ) -> IngestResult<WriteStats> {
        unit.insert_file(file).await?;
        unit.insert_assembly(assembly).await?;

        let context = RecordContext {
            assembly_id: assembly.id,
            chunk_size: self.chunk_size,
            user: assembly.user.clone(),
        };
        let stats = self.stream_records(unit, &artifact.path, context).await?;

        unit.insert_change(change).await?;
        Ok(stats)
    }

    async fn stream_records(
        &self,
        unit: &mut dyn StoreUnit,
        artifact: &Path,
        context: RecordContext,
    ) -> IngestResult<WriteStats> {
        let (tx, mut rx) = mpsc::channel(self.channel_depth);
        let artifact = artifact.to_path_buf();
        let producer = tokio::task::spawn_blocking(move || produce_ops(&artifact, context, tx));

        let mut stats = WriteStats::default();
        let mut failure: Option<IngestError> = None;

        while let Some(item) = rx.recv().await {
            let applied = match item {
                Ok(op) => apply_op(unit, op, &mut stats).await,
                Err(e) => Err(IngestError::Fasta(e)),
            };
            if let Err(e) = applied {
                failure = Some(e);
                break;
            }
        }

        // Closing the receiver stops the producer at its next send.
        drop(rx);
        producer.await?;

        match failure {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }
}

async fn apply_op(unit: &mut dyn StoreUnit, op: ChunkOp, stats: &mut WriteStats) -> IngestResult<()> {
    match op {
        ChunkOp::StartRecord(refseq) => {
            debug!(refseq = %refseq.name, "Writing reference sequence");
            unit.insert_refseq(&refseq).await?;
            stats.refseqs += 1;
        },
        ChunkOp::Chunk(chunk) => {
            unit.insert_chunk(&chunk).await?;
            stats.chunks += 1;
            stats.residues += chunk.sequence.chars().count() as u64;
        },
        ChunkOp::FinishRecord { refseq_id, length } => {
            unit.set_refseq_length(refseq_id, length).await?;
        },
    }
    Ok(())
}

/// Blocking side of the pipeline: decompress, tokenize, accumulate, send.
fn produce_ops(artifact: &Path, context: RecordContext, tx: mpsc::Sender<Result<ChunkOp, FastaError>>) {
    let reader = match open_decompressed(artifact) {
        Ok(reader) => reader,
        Err(e) => {
            let _ = tx.blocking_send(Err(FastaError::Io(e)));
            return;
        },
    };

    let mut accumulator = ChunkAccumulator::new(context);
    let mut ops = Vec::new();

    for token in Tokenizer::new(reader) {
        if let Err(e) = token.and_then(|t| accumulator.feed(t, &mut ops)) {
            let _ = tx.blocking_send(Err(e));
            return;
        }
        for op in ops.drain(..) {
            if tx.blocking_send(Ok(op)).is_err() {
                return;
            }
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Base name without its final extension: `toy.fa` -> `toy`.
pub fn assembly_name(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| display_name(path))
}
