//! Build automation tasks for the Apollo loader
//!
//! Currently generates the `apollo-ingest` command reference from its clap
//! definitions so the docs cannot drift from the binary.

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for the Apollo loader", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the apollo-ingest command reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<apollo_ingest::cli::Cli>();

    let content = format!(
        r#"# apollo-ingest Reference

This documentation is auto-generated from the CLI source code. Last updated: {}.

## Overview

`apollo-ingest` loads every FASTA file of an input directory into the Apollo
document store. Each file is compressed to `<output>/<sha256>`, split into
reference sequences and fixed-size sequence chunks, and recorded with an
`AddAssemblyFromFileChange` change record. Files already ingested (same
basename and checksum) and assemblies that already exist are skipped.

## Quick Start

```bash
# Apply migrations and ingest ./files/fasta into PostgreSQL
export DATABASE_URL=postgresql://localhost/apollo
apollo-ingest --file-type fasta

# Try a directory without touching the database
apollo-ingest --file-type fasta --input ./genomes --output /tmp/artifacts --dry-run
```

## Commands

{}

## Environment Variables

- `APOLLO_FASTA_DIR` - Input directory (default: `files/fasta`)
- `APOLLO_OUTPUT_DIR` - Artifact directory (default: `output/fasta`)
- `APOLLO_FILE_CHUNK_SIZE` - Read block size in bytes (default: `4096`)
- `APOLLO_DB_CHUNK_SIZE` - Residues per stored chunk (default: `262144`)
- `APOLLO_WORKERS` - Concurrent files (default: available parallelism)
- `APOLLO_CHECKSUM_ALGORITHM` - `sha256` or `sha512` (default: `sha256`)
- `DATABASE_URL` - PostgreSQL connection URL
- `DATABASE_MAX_CONNECTIONS` - Pool size, raised to the worker count when lower (default: `10`)
- `LOG_LEVEL`, `LOG_FORMAT`, `LOG_OUTPUT`, `LOG_DIR`, `LOG_FILTER` - Logging

## Exit Status

`0` when every file was ingested or skipped; `1` for an unsupported file
type, invalid configuration, an unreachable store, or any failed file.

---

*To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("✅ Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
