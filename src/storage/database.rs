//! SQLite database client.
//!
//! Holds the connection pool and the small record types that do not need a
//! file on disk: proofreading history, generated outlines and parsed
//! name-tag workbooks.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use thiserror::Error;

use super::migrations::{MigrationError, MigrationRunner};

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Connection to the database failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    /// Record not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
}

/// A proofreading run kept for the history view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofreadRecord {
    pub id: String,
    pub original: String,
    pub corrected: String,
    pub suggestions: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// A generated document outline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureRecord {
    pub id: String,
    pub prompt: String,
    pub structure: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
}

/// Rows of an uploaded name-tag workbook, ten lines per badge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NametagBatch {
    pub id: String,
    pub source_name: String,
    pub rows: Vec<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

/// SQLite database client.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connects to the database, creating the file if needed.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite URL (e.g. "sqlite://./data/efficepart.db" or "sqlite::memory:")
    pub async fn connect(database_url: &str) -> Result<Self, DatabaseError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(10));

        // Every connection to an in-memory database is a separate database.
        let in_memory = database_url.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 8 })
            .acquire_timeout(Duration::from_secs(30));
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Creates a new database client from an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Runs database migrations.
    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let runner = MigrationRunner::new(self.pool.clone());
        runner.run_migrations().await?;
        Ok(())
    }

    // =========================================================================
    // Proofreading history
    // =========================================================================

    /// Saves a proofreading run.
    pub async fn save_proofread(&self, record: &ProofreadRecord) -> Result<(), DatabaseError> {
        let suggestions = serde_json::to_string(&record.suggestions)?;

        sqlx::query(
            r#"
            INSERT INTO proofread_items (id, original, corrected, suggestions, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.original)
        .bind(&record.corrected)
        .bind(&suggestions)
        .bind(record.timestamp.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Lists proofreading runs, newest first.
    pub async fn list_proofreads(&self, limit: u32) -> Result<Vec<ProofreadRecord>, DatabaseError> {
        let rows = sqlx::query(
            r#"
            SELECT id, original, corrected, suggestions, created_at
            FROM proofread_items
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let suggestions: String = row.get("suggestions");
            records.push(ProofreadRecord {
                id: row.get("id"),
                original: row.get("original"),
                corrected: row.get("corrected"),
                suggestions: serde_json::from_str(&suggestions)?,
                timestamp: millis_to_datetime(row.get("created_at")),
            });
        }

        Ok(records)
    }

    /// Saves a generated outline.
    pub async fn save_structure(&self, record: &StructureRecord) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO text_structures (id, prompt, structure, kind, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.prompt)
        .bind(&record.structure)
        .bind(&record.kind)
        .bind(record.timestamp.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Lists generated outlines, newest first.
    pub async fn list_structures(&self) -> Result<Vec<StructureRecord>, DatabaseError> {
        let rows = sqlx::query(
            r#"
            SELECT id, prompt, structure, kind, created_at
            FROM text_structures
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| StructureRecord {
                id: row.get("id"),
                prompt: row.get("prompt"),
                structure: row.get("structure"),
                kind: row.get("kind"),
                timestamp: millis_to_datetime(row.get("created_at")),
            })
            .collect())
    }

    // =========================================================================
    // Name-tag batches
    // =========================================================================

    /// Saves the parsed rows of an uploaded workbook.
    pub async fn save_nametag_batch(&self, batch: &NametagBatch) -> Result<(), DatabaseError> {
        let rows = serde_json::to_string(&batch.rows)?;

        sqlx::query(
            r#"
            INSERT INTO nametag_batches (id, source_name, rows, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&batch.id)
        .bind(&batch.source_name)
        .bind(&rows)
        .bind(batch.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Loads a parsed workbook by id.
    pub async fn get_nametag_batch(&self, id: &str) -> Result<NametagBatch, DatabaseError> {
        let row = sqlx::query(
            r#"
            SELECT id, source_name, rows, created_at
            FROM nametag_batches
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("nametag batch {}", id)))?;

        let rows: String = row.get("rows");
        Ok(NametagBatch {
            id: row.get("id"),
            source_name: row.get("source_name"),
            rows: serde_json::from_str(&rows)?,
            created_at: millis_to_datetime(row.get("created_at")),
        })
    }

    /// Deletes name-tag batches created before `cutoff`.
    pub async fn purge_nametag_batches(&self, cutoff: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM nametag_batches WHERE created_at <= ?")
            .bind(cutoff.timestamp_millis())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Converts stored unix milliseconds back into a UTC timestamp.
pub(crate) fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default()
}
