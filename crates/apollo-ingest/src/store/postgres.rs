//! PostgreSQL document store
//!
//! Each collection is a table (see `migrations/`). A unit of work is a
//! database transaction; uniqueness of `files(basename, checksum)` and
//! `assemblies(name)` is enforced by constraints and surfaced as
//! [`StoreError::Duplicate`].
//!
//! A session checks one connection out of the pool and keeps it until it is
//! dropped, so lookups, the counter and the transaction of one file all run
//! on that connection. The pool must hold at least one connection per
//! worker (see [`LoaderConfig::pool_size`](crate::config::LoaderConfig::pool_size)).

use std::time::Duration;

use apollo_common::types::{Assembly, ChangeRecord, ReferenceSequence, SequenceChunk, SourceFile};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Connection, Postgres, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use super::{DocumentStore, StoreError, StoreResult, StoreSession, StoreUnit};

#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await?;

        info!(max_connections, "Connected to document store");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn session(&self) -> StoreResult<Box<dyn StoreSession>> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(PgSession { conn }))
    }

    async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("Document store migrations applied");
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct FileRow {
    id: Uuid,
    basename: String,
    checksum: String,
    content_type: String,
}

impl From<FileRow> for SourceFile {
    fn from(row: FileRow) -> Self {
        SourceFile {
            id: row.id,
            basename: row.basename,
            checksum: row.checksum,
            content_type: row.content_type,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AssemblyRow {
    id: Uuid,
    name: String,
    user_tag: String,
    status: i32,
}

impl From<AssemblyRow> for Assembly {
    fn from(row: AssemblyRow) -> Self {
        Assembly {
            id: row.id,
            name: row.name,
            user: row.user_tag,
            status: row.status,
        }
    }
}

struct PgSession {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl StoreSession for PgSession {
    async fn find_file(&mut self, basename: &str, checksum: &str) -> StoreResult<Option<SourceFile>> {
        let row = sqlx::query_as::<_, FileRow>(
            r#"
            SELECT id, basename, checksum, content_type
            FROM files
            WHERE basename = $1 AND checksum = $2
            "#,
        )
        .bind(basename)
        .bind(checksum)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row.map(SourceFile::from))
    }

    async fn find_assembly(&mut self, name: &str) -> StoreResult<Option<Assembly>> {
        let row = sqlx::query_as::<_, AssemblyRow>(
            "SELECT id, name, user_tag, status FROM assemblies WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row.map(Assembly::from))
    }

    async fn next_sequence_value(&mut self, counter_id: &str) -> StoreResult<i64> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO counters (id, sequence_value)
            VALUES ($1, 1)
            ON CONFLICT (id) DO UPDATE SET sequence_value = counters.sequence_value + 1
            RETURNING sequence_value
            "#,
        )
        .bind(counter_id)
        .fetch_one(&mut *self.conn)
        .await?;

        debug!(counter = counter_id, value, "Incremented counter");
        Ok(value)
    }

    async fn begin(&mut self) -> StoreResult<Box<dyn StoreUnit + '_>> {
        let tx = self.conn.begin().await?;
        Ok(Box::new(PgUnit { tx }))
    }
}

struct PgUnit<'c> {
    tx: Transaction<'c, Postgres>,
}

/// Map a unique-constraint violation to [`StoreError::Duplicate`].
fn unique_or(err: sqlx::Error, collection: &'static str, key: impl FnOnce() -> String) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return StoreError::Duplicate {
                collection,
                key: key(),
            };
        }
    }
    StoreError::Sqlx(err)
}

#[async_trait]
impl StoreUnit for PgUnit<'_> {
    async fn insert_file(&mut self, file: &SourceFile) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO files (id, basename, checksum, content_type)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(file.id)
        .bind(&file.basename)
        .bind(&file.checksum)
        .bind(&file.content_type)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| unique_or(e, "files", || format!("{}@{}", file.basename, file.checksum)))?;
        Ok(())
    }

    async fn insert_assembly(&mut self, assembly: &Assembly) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO assemblies (id, name, user_tag, status)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(assembly.id)
        .bind(&assembly.name)
        .bind(&assembly.user)
        .bind(assembly.status)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| unique_or(e, "assemblies", || assembly.name.clone()))?;
        Ok(())
    }

    async fn insert_refseq(&mut self, refseq: &ReferenceSequence) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refseqs (id, assembly_id, name, description, length, chunk_size, user_tag, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(refseq.id)
        .bind(refseq.assembly_id)
        .bind(&refseq.name)
        .bind(&refseq.description)
        .bind(refseq.length)
        .bind(refseq.chunk_size)
        .bind(&refseq.user)
        .bind(refseq.status)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn set_refseq_length(&mut self, refseq_id: Uuid, length: i64) -> StoreResult<()> {
        let result = sqlx::query("UPDATE refseqs SET length = $2 WHERE id = $1")
            .bind(refseq_id)
            .bind(length)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                collection: "refseqs",
                key: refseq_id.to_string(),
            });
        }
        Ok(())
    }

    async fn insert_chunk(&mut self, chunk: &SequenceChunk) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refseqchunks (id, refseq_id, n, sequence, user_tag, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(chunk.id)
        .bind(chunk.refseq_id)
        .bind(chunk.index)
        .bind(&chunk.sequence)
        .bind(&chunk.user)
        .bind(chunk.status)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            unique_or(e, "refseqchunks", || format!("{}#{}", chunk.refseq_id, chunk.index))
        })?;
        Ok(())
    }

    async fn insert_change(&mut self, change: &ChangeRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO changes (id, type_name, assembly_id, changes, user_tag, sequence)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(change.id)
        .bind(&change.type_name)
        .bind(change.assembly_id)
        .bind(Json(&change.changes))
        .bind(&change.user)
        .bind(change.sequence)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| unique_or(e, "changes", || change.sequence.to_string()))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
