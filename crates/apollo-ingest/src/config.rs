//! Loader configuration

use std::path::PathBuf;

use anyhow::Context;
use apollo_common::types::ChecksumAlgorithm;
use serde::{Deserialize, Serialize};

// ============================================================================
// Loader Configuration Constants
// ============================================================================

/// Default directory scanned for FASTA files.
pub const DEFAULT_FASTA_DIR: &str = "files/fasta";

/// Default directory receiving checksum-named artifacts.
pub const DEFAULT_OUTPUT_DIR: &str = "output/fasta";

/// Default read block size for compression and hashing (4 KiB).
pub const DEFAULT_FILE_CHUNK_SIZE: usize = 4096;

/// Default number of residues per stored sequence chunk (256 KiB).
pub const DEFAULT_DB_CHUNK_SIZE: usize = 262_144;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/apollo";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Depth of the channel between the FASTA reader and the store writer.
pub const DEFAULT_CHANNEL_DEPTH: usize = 64;

/// Which document store receives the writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub file_chunk_size: usize,
    pub db_chunk_size: usize,
    pub workers: usize,
    pub channel_depth: usize,
    pub checksum_algorithm: ChecksumAlgorithm,
    pub backend: StoreBackend,
    pub database: DatabaseConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Parse `key` through `lookup`. Absent is `None`; malformed is an error.
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("{}", e))
                .with_context(|| format!("Invalid value for {}: '{}'", key, raw))
        })
        .transpose()
}

/// Worker count used when none is configured.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl LoaderConfig {
    /// Load configuration from `.env`, the environment and defaults.
    ///
    /// The result is not validated; call [`validate`](Self::validate) once
    /// command-line overrides have been applied.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from `lookup`, falling back to defaults for
    /// absent keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = LoaderConfig::default();

        Ok(LoaderConfig {
            input_dir: lookup("APOLLO_FASTA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.input_dir),
            output_dir: lookup("APOLLO_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            file_chunk_size: parse_var(&lookup, "APOLLO_FILE_CHUNK_SIZE")?
                .unwrap_or(defaults.file_chunk_size),
            db_chunk_size: parse_var(&lookup, "APOLLO_DB_CHUNK_SIZE")?.unwrap_or(defaults.db_chunk_size),
            workers: parse_var(&lookup, "APOLLO_WORKERS")?.unwrap_or(defaults.workers),
            channel_depth: defaults.channel_depth,
            checksum_algorithm: parse_var(&lookup, "APOLLO_CHECKSUM_ALGORITHM")?
                .unwrap_or(defaults.checksum_algorithm),
            backend: defaults.backend,
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").unwrap_or(defaults.database.url),
                max_connections: parse_var(&lookup, "DATABASE_MAX_CONNECTIONS")?
                    .unwrap_or(defaults.database.max_connections),
            },
        })
    }

    /// Connections to request from the pool: at least one per worker, since
    /// every in-flight file holds its own.
    pub fn pool_size(&self) -> u32 {
        let workers = u32::try_from(self.workers).unwrap_or(u32::MAX);
        self.database.max_connections.max(workers)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.file_chunk_size == 0 {
            anyhow::bail!("File chunk size must be greater than 0");
        }

        if self.db_chunk_size == 0 {
            anyhow::bail!("DB chunk size must be greater than 0");
        }

        if self.workers == 0 {
            anyhow::bail!("Worker count must be greater than 0");
        }

        if self.channel_depth == 0 {
            anyhow::bail!("Channel depth must be greater than 0");
        }

        if self.backend == StoreBackend::Postgres {
            if self.database.url.is_empty() {
                anyhow::bail!("Database URL cannot be empty");
            }
            if self.database.max_connections == 0 {
                anyhow::bail!("Database max_connections must be greater than 0");
            }
        }

        if self.input_dir == self.output_dir {
            anyhow::bail!(
                "Input and output directories must differ (both are {})",
                self.input_dir.display()
            );
        }

        Ok(())
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_FASTA_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            file_chunk_size: DEFAULT_FILE_CHUNK_SIZE,
            db_chunk_size: DEFAULT_DB_CHUNK_SIZE,
            workers: default_workers(),
            channel_depth: DEFAULT_CHANNEL_DEPTH,
            checksum_algorithm: ChecksumAlgorithm::default(),
            backend: StoreBackend::Postgres,
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            },
        }
    }
}
