//! SQLite-backed persistence.
//!
//! # Overview
//!
//! - **Database**: connection pool plus the small records (proofreading
//!   history, generated outlines, parsed name-tag workbooks)
//! - **FileStore**: expiring uploads for the transfer buckets, bodies on disk
//!   and metadata in `stored_files`
//! - **Sweeper**: background task purging expired uploads
//! - **Migrations**: schema management
//!
//! # Usage
//!
//! ```rust,ignore
//! use efficepart::storage::{Bucket, Database, FileStore};
//! use std::sync::Arc;
//!
//! let db = Database::connect("sqlite://./data/efficepart.db?mode=rwc").await?;
//! db.run_migrations().await?;
//!
//! let store = FileStore::new(Bucket::Transfer, "./data/uploads/transfer", Arc::new(db), retention, cap);
//! let file = store.store_bytes("memo.pdf", "application/pdf", None, body).await?;
//! let (file, path) = store.open_for_download(&file.id.to_string(), None).await?;
//! ```

pub mod database;
pub mod files;
pub mod migrations;
pub mod schema;
pub mod sweeper;

pub use database::{Database, DatabaseError, NametagBatch, ProofreadRecord, StructureRecord};
pub use files::{
    hash_password, verify_password, Bucket, FileStats, FileStore, PurgeReport, StagedUpload,
    StorageError, StoredFile,
};
pub use migrations::{MigrationError, MigrationRunner};
pub use sweeper::{SweepReport, Sweeper};
