//! PostgreSQL document store tests
//!
//! These start a PostgreSQL container and are ignored by default:
//!
//! ```bash
//! cargo test -p apollo-ingest --test postgres_tests -- --ignored
//! ```

mod common;

use anyhow::Result;
use apollo_common::types::{user_tag, Assembly, SourceFile, CHANGE_COUNTER_ID};
use apollo_ingest::store::{DocumentStore, PgDocumentStore, StoreError};
use apollo_ingest::{run, FileOutcome, SkipReason};
use common::{init_tracing, Workspace, TOY_FASTA};
use serial_test::serial;
use testcontainers::{runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::info;

async fn start_store() -> Result<(ContainerAsync<Postgres>, PgDocumentStore)> {
    let container = Postgres::default().with_tag("16-alpine").start().await?;

    let host = container.get_host().await?;
    let port = container.get_host_port_ipv4(5432).await?;
    let url = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

    let store = PgDocumentStore::connect(&url, 8).await?;
    store.migrate().await?;
    info!(%url, "PostgreSQL store ready");

    Ok((container, store))
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_toy_file_round_trip() -> Result<()> {
    init_tracing();
    let (_container, store) = start_store().await?;

    let ws = Workspace::new(4);
    ws.write("toy.fa", TOY_FASTA);

    let summary = run("fasta", &ws.config, &store).await?;
    assert_eq!(summary.ingested(), 1);

    let lengths: Vec<(String, i64)> =
        sqlx::query_as("SELECT name, length FROM refseqs ORDER BY name")
            .fetch_all(store.pool())
            .await?;
    assert_eq!(lengths, vec![("seq1".to_string(), 12), ("seq2".to_string(), 2)]);

    let chunks: Vec<(i64, String)> = sqlx::query_as(
        r#"
        SELECT c.n, c.sequence
        FROM refseqchunks c JOIN refseqs r ON r.id = c.refseq_id
        WHERE r.name = 'seq1'
        ORDER BY c.n
        "#,
    )
    .fetch_all(store.pool())
    .await?;
    assert_eq!(
        chunks,
        vec![
            (0, "ACGT".to_string()),
            (1, "ACGT".to_string()),
            (2, "ACGT".to_string())
        ]
    );

    let (type_name, sequence, assembly_name): (String, i64, String) = sqlx::query_as(
        "SELECT type_name, sequence, changes->0->>'assemblyName' FROM changes",
    )
    .fetch_one(store.pool())
    .await?;
    assert_eq!(type_name, "AddAssemblyFromFileChange");
    assert_eq!(sequence, 1);
    assert_eq!(assembly_name, "toy");

    // Second run is a pure skip.
    let again = run("fasta", &ws.config, &store).await?;
    assert!(matches!(
        again.outcome("toy.fa"),
        Some(FileOutcome::Skipped(SkipReason::AlreadyIngested))
    ));
    let counter: i64 = sqlx::query_scalar("SELECT sequence_value FROM counters WHERE id = $1")
        .bind(CHANGE_COUNTER_ID)
        .fetch_one(store.pool())
        .await?;
    assert_eq!(counter, 1);

    Ok(())
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_failed_file_leaves_no_rows() -> Result<()> {
    init_tracing();
    let (_container, store) = start_store().await?;

    let ws = Workspace::new(4);
    ws.write("bad.fa", ">ok\nACGT\n>\nGG\n");

    let summary = run("fasta", &ws.config, &store).await?;
    assert_eq!(summary.failed(), 1);

    for table in ["files", "assemblies", "refseqs", "refseqchunks", "changes"] {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(store.pool())
            .await?;
        assert_eq!(count, 0, "{} should be empty", table);
    }

    Ok(())
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_counter_and_unique_constraints() -> Result<()> {
    init_tracing();
    let (_container, store) = start_store().await?;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let mut session = store.session().await?;
            session.next_sequence_value(CHANGE_COUNTER_ID).await
        }));
    }
    let mut values = Vec::new();
    for handle in handles {
        values.push(handle.await??);
    }
    values.sort();
    assert_eq!(values, (1..=16).collect::<Vec<i64>>());

    let mut session = store.session().await?;
    let mut unit = session.begin().await?;
    unit.insert_file(&SourceFile::fasta("a.fa", "d1")).await?;
    unit.insert_assembly(&Assembly::new("a", user_tag(1))).await?;
    unit.commit().await?;

    let mut unit = session.begin().await?;
    let err = unit
        .insert_assembly(&Assembly::new("a", user_tag(2)))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Duplicate { collection: "assemblies", .. }));
    unit.rollback().await?;

    assert!(session.find_file("a.fa", "d1").await?.is_some());
    assert!(session.find_assembly("a").await?.is_some());

    Ok(())
}
