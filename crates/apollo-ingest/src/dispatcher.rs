//! Fan-out over the input directory
//!
//! Every regular file in the input directory becomes one task. Up to
//! `workers` tasks run at once; each acquires its own store session and
//! drops it when the file is done, whatever the outcome. Tasks share
//! nothing but the store.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use apollo_common::types::FileType;
use apollo_common::{LoaderError, Result};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

use crate::compress::Compressor;
use crate::config::LoaderConfig;
use crate::coordinator::{FileOutcome, IngestionCoordinator};
use crate::error::IngestError;
use crate::store::DocumentStore;

/// Per-file outcomes of one run, ordered by file name
#[derive(Debug)]
pub struct RunSummary {
    pub outcomes: Vec<(String, FileOutcome)>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn ingested(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_ingested()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_skipped()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failed()).count()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    pub fn outcome(&self, file_name: &str) -> Option<&FileOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == file_name)
            .map(|(_, outcome)| outcome)
    }

    /// Log the totals of the run. Per-file outcomes are logged as they happen.
    pub fn log(&self) {
        info!(
            files = self.outcomes.len(),
            ingested = self.ingested(),
            skipped = self.skipped(),
            failed = self.failed(),
            elapsed_ms = self.elapsed.as_millis() as u64,
            "Ingestion run finished"
        );
    }
}

/// Regular files directly inside `dir`, sorted by name.
pub fn list_input_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        LoaderError::Config(format!("Cannot read input directory {}: {}", dir.display(), e))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    match ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} files ({eta})")
    {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => warn!(error = %e, "Invalid progress bar template"),
    }
    pb
}

/// Ingest every file of the input directory.
///
/// An unsupported `file_type` aborts before the directory is read.
pub async fn run(file_type: &str, config: &LoaderConfig, store: &dyn DocumentStore) -> Result<RunSummary> {
    let file_type: FileType = file_type.parse()?;
    let files = list_input_files(&config.input_dir)?;

    info!(
        %file_type,
        files = files.len(),
        workers = config.workers,
        input = %config.input_dir.display(),
        output = %config.output_dir.display(),
        "Starting ingestion run"
    );

    let coordinator = IngestionCoordinator::new(
        Compressor::new(&config.output_dir, config.file_chunk_size, config.checksum_algorithm),
        config.db_chunk_size,
        config.channel_depth,
    );

    let started = Instant::now();
    let pb = progress_bar(files.len() as u64);

    let coordinator = &coordinator;
    let pb_ref = &pb;
    let mut outcomes: Vec<(String, FileOutcome)> = stream::iter(files)
        .map(|path| async move {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            let outcome = match store.session().await {
                Ok(mut session) => coordinator.ingest_file(&path, session.as_mut()).await,
                Err(e) => {
                    error!(file = %name, error = %e, "Failed to acquire store session");
                    FileOutcome::Failed(IngestError::from(e))
                },
            };

            pb_ref.inc(1);
            (name, outcome)
        })
        .buffer_unordered(config.workers.max(1))
        .collect()
        .await;

    pb.finish_and_clear();
    outcomes.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(RunSummary {
        outcomes,
        elapsed: started.elapsed(),
    })
}
