//! Shared fixtures for ingestion integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use apollo_ingest::config::{LoaderConfig, StoreBackend};
use tempfile::TempDir;

pub const TOY_FASTA: &str = ">seq1 desc\nACGTACGT\nACGT\n>seq2\nTT\n";

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,apollo_ingest=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Scratch input and output directories plus a matching configuration
pub struct Workspace {
    pub input: TempDir,
    pub output: TempDir,
    pub config: LoaderConfig,
}

impl Workspace {
    pub fn new(db_chunk_size: usize) -> Self {
        let input = tempfile::tempdir().expect("input dir");
        let output = tempfile::tempdir().expect("output dir");
        let config = LoaderConfig {
            input_dir: input.path().to_path_buf(),
            output_dir: output.path().to_path_buf(),
            db_chunk_size,
            workers: 4,
            backend: StoreBackend::Memory,
            ..LoaderConfig::default()
        };
        Self {
            input,
            output,
            config,
        }
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.input.path().join(name);
        std::fs::write(&path, content).expect("write fixture");
        path
    }

    pub fn output_files(&self) -> Vec<PathBuf> {
        list(self.output.path())
    }
}

fn list(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .expect("read dir")
        .map(|e| e.expect("dir entry").path())
        .collect();
    entries.sort();
    entries
}
