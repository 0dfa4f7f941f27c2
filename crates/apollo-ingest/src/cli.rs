//! Command-line interface definitions

use std::path::PathBuf;

use clap::Parser;

use crate::config::{LoaderConfig, StoreBackend};

#[derive(Parser, Debug)]
#[command(name = "apollo-ingest")]
#[command(author, version, about = "Load FASTA assemblies into the Apollo document store")]
pub struct Cli {
    /// Input file type (only `fasta` is supported)
    #[arg(long)]
    pub file_type: String,

    /// Read block size in bytes for compression and hashing
    #[arg(long)]
    pub file_chunk_size: Option<usize>,

    /// Residues per stored sequence chunk
    #[arg(long)]
    pub db_chunk_size: Option<usize>,

    /// Directory containing the FASTA files to ingest
    #[arg(short, long, env = "APOLLO_FASTA_DIR")]
    pub input: Option<PathBuf>,

    /// Directory receiving checksum-named compressed copies
    #[arg(short, long, env = "APOLLO_OUTPUT_DIR")]
    pub output: Option<PathBuf>,

    /// Number of files ingested concurrently
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Ingest into an in-memory store instead of PostgreSQL
    #[arg(long)]
    pub dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Apply command-line overrides on top of `config`, then validate the result.
    pub fn apply(&self, config: &mut LoaderConfig) -> anyhow::Result<()> {
        if let Some(size) = self.file_chunk_size {
            config.file_chunk_size = size;
        }
        if let Some(size) = self.db_chunk_size {
            config.db_chunk_size = size;
        }
        if let Some(input) = &self.input {
            config.input_dir = input.clone();
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(url) = &self.database_url {
            config.database.url = url.clone();
        }
        if self.dry_run {
            config.backend = StoreBackend::Memory;
        }

        config.validate()
    }
}
