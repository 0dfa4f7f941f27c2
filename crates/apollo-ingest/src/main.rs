//! Apollo Ingest - FASTA loader

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use apollo_common::logging::{init_logging, LogConfig, LogLevel};
use apollo_common::types::FileType;
use apollo_ingest::cli::Cli;
use apollo_ingest::config::{LoaderConfig, StoreBackend};
use apollo_ingest::store::{DocumentStore, MemoryStore, PgDocumentStore};
use clap::Parser;
use tracing::{error, info};

async fn open_store(config: &LoaderConfig) -> Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.backend {
        StoreBackend::Postgres => Arc::new(
            PgDocumentStore::connect(&config.database.url, config.pool_size())
                .await
                .context("Failed to connect to the document store")?,
        ),
        StoreBackend::Memory => {
            info!("Dry run: writing to an in-memory store");
            Arc::new(MemoryStore::new())
        },
    };

    store.migrate().await.context("Failed to prepare the document store")?;
    Ok(store)
}

async fn execute(cli: Cli) -> Result<bool> {
    // Reject the file type before touching anything else.
    let file_type: FileType = cli.file_type.parse()?;
    info!(%file_type, dry_run = cli.dry_run, "Starting apollo-ingest");

    let mut config = LoaderConfig::load().context("Failed to load configuration")?;
    cli.apply(&mut config).context("Invalid configuration")?;

    let store = open_store(&config).await?;
    let summary = apollo_ingest::run(&cli.file_type, &config, store.as_ref()).await?;
    summary.log();

    Ok(!summary.has_failures())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("apollo-ingest")
        .build();

    // Merge with environment variables (they take precedence)
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            return ExitCode::FAILURE;
        },
    };

    match execute(cli).await {
        Ok(true) => {
            info!("Ingestion complete");
            ExitCode::SUCCESS
        },
        Ok(false) => {
            error!("Ingestion finished with failed files");
            ExitCode::FAILURE
        },
        Err(e) => {
            error!(error = %format!("{:#}", e), "Ingestion aborted");
            ExitCode::FAILURE
        },
    }
}
