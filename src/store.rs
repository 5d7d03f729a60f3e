//! SQLite metadata store.
//!
//! One table maps document names to their persisted index pair (vector
//! index JSON and chunk list JSON). The concatenated scope is seeded at
//! schema creation so it is always listable, even before the first
//! ingestion.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::models::IndexRecord;

/// Name of the always-present scope that aggregates every ingested file.
pub const CONCATENATE: &str = "concatenate";

pub struct MetadataStore {
    pool: SqlitePool,
}

impl MetadataStore {
    /// Open (creating if missing) the database at `path`.
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Create the schema if absent and seed the concatenated scope row
    /// pointing at the given index pair paths.
    pub async fn create_table_if_absent(
        &self,
        concat_vector_path: &str,
        concat_document_path: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS document (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                vector_path TEXT NOT NULL,
                document_path TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let seeded: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM document WHERE name = ? LIMIT 1")
                .bind(CONCATENATE)
                .fetch_optional(&self.pool)
                .await?;

        if seeded.is_none() {
            sqlx::query("INSERT INTO document (name, vector_path, document_path) VALUES (?, ?, ?)")
                .bind(CONCATENATE)
                .bind(concat_vector_path)
                .bind(concat_document_path)
                .execute(&self.pool)
                .await?;
            info!("seeded concatenated scope");
        }

        Ok(())
    }

    /// Record a newly ingested document. Returns the new row id.
    pub async fn insert(
        &self,
        name: &str,
        vector_path: &str,
        document_path: &str,
    ) -> Result<i64> {
        let result =
            sqlx::query("INSERT INTO document (name, vector_path, document_path) VALUES (?, ?, ?)")
                .bind(name)
                .bind(vector_path)
                .bind(document_path)
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    /// Repoint an existing record at a new index pair.
    pub async fn update(&self, id: i64, vector_path: &str, document_path: &str) -> Result<()> {
        sqlx::query("UPDATE document SET vector_path = ?, document_path = ? WHERE id = ?")
            .bind(vector_path)
            .bind(document_path)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All records, in insertion order.
    pub async fn list_all(&self) -> Result<Vec<IndexRecord>> {
        let records = sqlx::query_as::<_, IndexRecord>(
            "SELECT id, name, vector_path, document_path FROM document ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Look up one record by id.
    pub async fn get(&self, id: i64) -> Result<Option<IndexRecord>> {
        let record = sqlx::query_as::<_, IndexRecord>(
            "SELECT id, name, vector_path, document_path FROM document WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}
