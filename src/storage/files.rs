//! Expiring file store for the transfer buckets.
//!
//! File bodies live on disk under the bucket directory; metadata lives in
//! the `stored_files` table. A row is inserted only after the body has been
//! fully written and synced, so a visible record always has a complete file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::multipart::MultipartError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::database::{millis_to_datetime, Database, DatabaseError};
use crate::config::ToolKind;
use crate::error::UploadError;
use crate::upload::sanitize_filename;

const PART_SUFFIX: &str = ".part";

/// Files younger than this are never treated as orphans.
const ORPHAN_GRACE: Duration = Duration::from_secs(3600);

/// Errors that can occur during file storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQL query failed.
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    /// File unknown, expired or missing on disk.
    #[error("file not found or expired: {0}")]
    NotFound(String),

    #[error("password required")]
    PasswordRequired,

    #[error("incorrect password")]
    PasswordMismatch,

    /// Upload exceeded the bucket cap.
    #[error("file exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },

    /// Storage directory creation failed.
    #[error("Failed to create storage directory: {0}")]
    DirectoryCreationFailed(String),

    /// A stored row could not be decoded.
    #[error("invalid stored record: {0}")]
    InvalidRecord(String),

    /// The upload stream itself failed.
    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl From<MultipartError> for StorageError {
    fn from(err: MultipartError) -> Self {
        StorageError::Upload(UploadError::Multipart(err))
    }
}

/// The two transfer buckets sharing the `stored_files` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Transfer,
    Gigafile,
}

impl Bucket {
    pub const ALL: [Bucket; 2] = [Bucket::Transfer, Bucket::Gigafile];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Transfer => "transfer",
            Bucket::Gigafile => "gigafile",
        }
    }

    /// Tool that owns this bucket.
    pub fn tool(&self) -> ToolKind {
        match self {
            Bucket::Transfer => ToolKind::Transfer,
            Bucket::Gigafile => ToolKind::Gigafile,
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata of one stored upload.
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub id: Uuid,
    pub bucket: Bucket,
    pub stored_name: String,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub checksum: String,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub downloads: u64,
    pub uploaded_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl StoredFile {
    pub fn password_protected(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Result of an expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub files: u64,
    pub bytes: u64,
}

impl PurgeReport {
    pub fn merge(&mut self, other: PurgeReport) {
        self.files += other.files;
        self.bytes += other.bytes;
    }
}

/// Aggregate numbers for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct FileStats {
    pub total_files: u64,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
    pub total_downloads: u64,
}

/// Hashes a download password, salted with the file id.
pub fn hash_password(file_id: &Uuid, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_id.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Checks a password against a stored hash in constant time.
pub fn verify_password(file_id: &Uuid, password: &str, expected_hash: &str) -> bool {
    let computed = hash_password(file_id, password);
    computed.as_bytes().ct_eq(expected_hash.as_bytes()).into()
}

/// An upload body written to disk but not yet recorded.
#[derive(Debug)]
pub struct StagedUpload {
    id: Uuid,
    stored_name: String,
    part_path: PathBuf,
    original_name: String,
    mime_type: String,
    size_bytes: u64,
    checksum: String,
}

impl StagedUpload {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// Storage for one bucket of expiring uploads.
pub struct FileStore {
    bucket: Bucket,
    base_path: PathBuf,
    db: Arc<Database>,
    retention: Duration,
    max_size: u64,
}

impl FileStore {
    /// Creates a file store.
    ///
    /// # Arguments
    ///
    /// * `bucket` - Bucket this store reads and writes
    /// * `base_path` - Directory holding the bucket's files
    /// * `db` - Database client for metadata storage
    /// * `retention` - How long uploads stay downloadable
    /// * `max_size` - Upload cap in bytes
    pub fn new(
        bucket: Bucket,
        base_path: impl Into<PathBuf>,
        db: Arc<Database>,
        retention: Duration,
        max_size: u64,
    ) -> Self {
        Self {
            bucket,
            base_path: base_path.into(),
            db,
            retention,
            max_size,
        }
    }

    pub fn bucket(&self) -> Bucket {
        self.bucket
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Absolute path of a stored file.
    pub fn file_path(&self, file: &StoredFile) -> PathBuf {
        self.base_path.join(&file.stored_name)
    }

    async fn ensure_directories(&self) -> Result<(), StorageError> {
        if !fs::try_exists(&self.base_path).await.unwrap_or(false) {
            fs::create_dir_all(&self.base_path).await.map_err(|e| {
                StorageError::DirectoryCreationFailed(format!(
                    "Failed to create bucket directory {:?}: {}",
                    self.base_path, e
                ))
            })?;
        }
        Ok(())
    }

    /// Streams an upload to disk and records it.
    ///
    /// Equivalent to [`FileStore::stage_stream`] followed by
    /// [`FileStore::commit`].
    pub async fn store_stream<S, E>(
        &self,
        original_name: &str,
        mime_type: &str,
        password: Option<&str>,
        chunks: S,
    ) -> Result<StoredFile, StorageError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<StorageError>,
    {
        let staged = self.stage_stream(original_name, mime_type, chunks).await?;
        self.commit(staged, password).await
    }

    /// Writes an upload body to a `.part` file without recording it.
    ///
    /// The body is hashed and size-checked on the way and synced before
    /// returning. Nothing is visible to readers until [`FileStore::commit`].
    /// The partial file is removed when anything fails.
    pub async fn stage_stream<S, E>(
        &self,
        original_name: &str,
        mime_type: &str,
        chunks: S,
    ) -> Result<StagedUpload, StorageError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<StorageError>,
    {
        self.ensure_directories().await?;

        let id = Uuid::new_v4();
        let stored_name = format!("{}_{}", id, sanitize_filename(original_name));
        let part_path = self.base_path.join(format!("{}{}", stored_name, PART_SUFFIX));

        let (size_bytes, checksum) = match self.write_part(&part_path, chunks).await {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&part_path).await;
                return Err(e);
            }
        };

        tracing::debug!(bucket = %self.bucket, file_id = %id, bytes = size_bytes, "Staged upload");

        Ok(StagedUpload {
            id,
            stored_name,
            part_path,
            original_name: original_name.to_string(),
            mime_type: mime_type.to_string(),
            size_bytes,
            checksum,
        })
    }

    /// Publishes a staged upload with its final password.
    ///
    /// The `.part` file is renamed into place and the metadata row inserted
    /// in one step, so the record never exists without its password.
    pub async fn commit(
        &self,
        staged: StagedUpload,
        password: Option<&str>,
    ) -> Result<StoredFile, StorageError> {
        let final_path = self.base_path.join(&staged.stored_name);
        if let Err(e) = fs::rename(&staged.part_path, &final_path).await {
            let _ = fs::remove_file(&staged.part_path).await;
            return Err(e.into());
        }

        let uploaded_at = Utc::now();
        let retention = chrono::Duration::from_std(self.retention)
            .unwrap_or_else(|_| chrono::Duration::days(7));
        let id = staged.id;
        let file = StoredFile {
            id,
            bucket: self.bucket,
            stored_name: staged.stored_name,
            original_name: staged.original_name,
            mime_type: staged.mime_type,
            size_bytes: staged.size_bytes,
            checksum: staged.checksum,
            password_hash: password
                .filter(|p| !p.is_empty())
                .map(|p| hash_password(&id, p)),
            downloads: 0,
            uploaded_at,
            expires_at: uploaded_at + retention,
        };

        if let Err(e) = self.insert(&file).await {
            let _ = fs::remove_file(&final_path).await;
            return Err(e);
        }

        tracing::info!(
            bucket = %self.bucket,
            file_id = %file.id,
            bytes = file.size_bytes,
            protected = file.password_protected(),
            "Stored upload"
        );

        Ok(file)
    }

    /// Drops a staged upload that will never be committed.
    pub async fn discard(&self, staged: StagedUpload) {
        if let Err(e) = fs::remove_file(&staged.part_path).await {
            tracing::warn!(
                bucket = %self.bucket,
                file_id = %staged.id,
                error = %e,
                "Failed to remove staged upload"
            );
        }
    }

    /// Stores an in-memory body.
    pub async fn store_bytes(
        &self,
        original_name: &str,
        mime_type: &str,
        password: Option<&str>,
        data: Bytes,
    ) -> Result<StoredFile, StorageError> {
        let chunks = futures::stream::iter([Ok::<_, StorageError>(data)]);
        self.store_stream(original_name, mime_type, password, chunks)
            .await
    }

    async fn write_part<S, E>(&self, path: &Path, chunks: S) -> Result<(u64, String), StorageError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<StorageError>,
    {
        let mut file = fs::File::create(path).await?;
        let mut hasher = Sha256::new();
        let mut size: u64 = 0;

        let mut chunks = std::pin::pin!(chunks);
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(Into::into)?;
            size += chunk.len() as u64;
            if size > self.max_size {
                return Err(StorageError::TooLarge {
                    limit: self.max_size,
                });
            }
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
        }

        file.flush().await?;
        file.sync_all().await?;

        Ok((size, hex::encode(hasher.finalize())))
    }

    async fn insert(&self, file: &StoredFile) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO stored_files
                (id, bucket, stored_name, original_name, mime_type, size_bytes,
                 checksum, password_hash, downloads, uploaded_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(file.id.to_string())
        .bind(self.bucket.as_str())
        .bind(&file.stored_name)
        .bind(&file.original_name)
        .bind(&file.mime_type)
        .bind(file.size_bytes as i64)
        .bind(&file.checksum)
        .bind(&file.password_hash)
        .bind(file.downloads as i64)
        .bind(file.uploaded_at.timestamp_millis())
        .bind(file.expires_at.timestamp_millis())
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    async fn fetch_row(&self, id: &str) -> Result<Option<StoredFile>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT id, stored_name, original_name, mime_type, size_bytes, checksum,
                   password_hash, downloads, uploaded_at, expires_at
            FROM stored_files
            WHERE id = ? AND bucket = ?
            "#,
        )
        .bind(id)
        .bind(self.bucket.as_str())
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|r| self.row_to_file(&r)).transpose()
    }

    fn row_to_file(&self, row: &SqliteRow) -> Result<StoredFile, StorageError> {
        let id: String = row.get("id");
        let id = Uuid::parse_str(&id).map_err(|e| StorageError::InvalidRecord(e.to_string()))?;
        let size: i64 = row.get("size_bytes");
        let downloads: i64 = row.get("downloads");

        Ok(StoredFile {
            id,
            bucket: self.bucket,
            stored_name: row.get("stored_name"),
            original_name: row.get("original_name"),
            mime_type: row.get("mime_type"),
            size_bytes: size.max(0) as u64,
            checksum: row.get("checksum"),
            password_hash: row.get("password_hash"),
            downloads: downloads.max(0) as u64,
            uploaded_at: millis_to_datetime(row.get("uploaded_at")),
            expires_at: millis_to_datetime(row.get("expires_at")),
        })
    }

    /// Returns a live record.
    pub async fn get(&self, id: &str) -> Result<StoredFile, StorageError> {
        self.get_at(id, Utc::now()).await
    }

    /// Returns the record if it is live at `now`.
    ///
    /// A record whose body vanished from disk is deleted and reported as
    /// not found.
    pub async fn get_at(&self, id: &str, now: DateTime<Utc>) -> Result<StoredFile, StorageError> {
        let not_found = || StorageError::NotFound(id.to_string());

        let file = self.fetch_row(id).await?.ok_or_else(not_found)?;
        if file.is_expired(now) {
            return Err(not_found());
        }

        if !fs::try_exists(self.file_path(&file)).await.unwrap_or(false) {
            tracing::warn!(bucket = %self.bucket, file_id = %file.id, "Stored file missing on disk");
            self.delete_row(&file.id).await?;
            return Err(not_found());
        }

        Ok(file)
    }

    /// Checks expiry and password, then counts the download.
    pub async fn open_for_download(
        &self,
        id: &str,
        password: Option<&str>,
    ) -> Result<(StoredFile, PathBuf), StorageError> {
        let mut file = self.get(id).await?;

        if let Some(expected) = &file.password_hash {
            match password.filter(|p| !p.is_empty()) {
                None => return Err(StorageError::PasswordRequired),
                Some(p) if !verify_password(&file.id, p, expected) => {
                    return Err(StorageError::PasswordMismatch)
                }
                Some(_) => {}
            }
        }

        sqlx::query("UPDATE stored_files SET downloads = downloads + 1 WHERE id = ?")
            .bind(file.id.to_string())
            .execute(self.db.pool())
            .await?;
        file.downloads += 1;

        let path = self.file_path(&file);
        Ok((file, path))
    }

    /// Live records, newest first.
    pub async fn list(&self) -> Result<Vec<StoredFile>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT id, stored_name, original_name, mime_type, size_bytes, checksum,
                   password_hash, downloads, uploaded_at, expires_at
            FROM stored_files
            WHERE bucket = ? AND expires_at > ?
            ORDER BY uploaded_at DESC
            "#,
        )
        .bind(self.bucket.as_str())
        .bind(Utc::now().timestamp_millis())
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(|r| self.row_to_file(r)).collect()
    }

    /// Removes a record and its body.
    pub async fn delete(&self, id: &str) -> Result<StoredFile, StorageError> {
        let file = self
            .fetch_row(id)
            .await?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        self.delete_row(&file.id).await?;
        self.remove_body(&file).await?;

        tracing::info!(bucket = %self.bucket, file_id = %file.id, "Deleted upload");
        Ok(file)
    }

    async fn delete_row(&self, id: &Uuid) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM stored_files WHERE id = ?")
            .bind(id.to_string())
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    async fn remove_body(&self, file: &StoredFile) -> Result<(), StorageError> {
        match fs::remove_file(self.file_path(file)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes every record expired at `now` together with its body.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgeReport, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT id, stored_name, original_name, mime_type, size_bytes, checksum,
                   password_hash, downloads, uploaded_at, expires_at
            FROM stored_files
            WHERE bucket = ? AND expires_at <= ?
            "#,
        )
        .bind(self.bucket.as_str())
        .bind(now.timestamp_millis())
        .fetch_all(self.db.pool())
        .await?;

        let mut report = PurgeReport::default();
        for row in &rows {
            let file = self.row_to_file(row)?;
            if let Err(e) = self.remove_body(&file).await {
                tracing::warn!(bucket = %self.bucket, file_id = %file.id, error = %e, "Failed to remove expired file");
                continue;
            }
            self.delete_row(&file.id).await?;
            report.files += 1;
            report.bytes += file.size_bytes;
        }

        if report.files > 0 {
            tracing::info!(
                bucket = %self.bucket,
                files = report.files,
                bytes = report.bytes,
                "Purged expired uploads"
            );
        }

        Ok(report)
    }

    /// Totals over live records.
    pub async fn stats(&self) -> Result<FileStats, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS files,
                   COALESCE(SUM(size_bytes), 0) AS bytes,
                   COALESCE(SUM(downloads), 0) AS downloads
            FROM stored_files
            WHERE bucket = ? AND expires_at > ?
            "#,
        )
        .bind(self.bucket.as_str())
        .bind(Utc::now().timestamp_millis())
        .fetch_one(self.db.pool())
        .await?;

        let files: i64 = row.get("files");
        let bytes: i64 = row.get("bytes");
        let downloads: i64 = row.get("downloads");
        let total_size_bytes = bytes.max(0) as u64;

        Ok(FileStats {
            total_files: files.max(0) as u64,
            total_size_bytes,
            total_size_mb: (total_size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0,
            total_downloads: downloads.max(0) as u64,
        })
    }

    /// Removes files on disk that no record points at.
    ///
    /// Anything modified within the last hour is left alone, which covers
    /// uploads still being staged. Older `.part` files were abandoned.
    pub async fn cleanup_orphans(&self) -> Result<u64, StorageError> {
        if !fs::try_exists(&self.base_path).await.unwrap_or(false) {
            return Ok(0);
        }

        let known: HashSet<String> =
            sqlx::query_scalar::<_, String>("SELECT stored_name FROM stored_files WHERE bucket = ?")
                .bind(self.bucket.as_str())
                .fetch_all(self.db.pool())
                .await?
                .into_iter()
                .collect();

        let mut removed = 0;
        let mut entries = fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if known.contains(&name) {
                continue;
            }

            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let recent = metadata
                .modified()
                .ok()
                .and_then(|m| m.elapsed().ok())
                .map_or(true, |age| age < ORPHAN_GRACE);
            if recent {
                continue;
            }

            fs::remove_file(entry.path()).await?;
            removed += 1;
        }

        if removed > 0 {
            tracing::info!(bucket = %self.bucket, removed, "Removed orphaned files");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store(bucket: Bucket, max_size: u64) -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::connect("sqlite::memory:").await.expect("connect");
        db.run_migrations().await.expect("migrate");
        let store = FileStore::new(
            bucket,
            dir.path().join(bucket.as_str()),
            Arc::new(db),
            Duration::from_secs(7 * 24 * 3600),
            max_size,
        );
        (dir, store)
    }

    #[test]
    fn test_password_hash_is_salted() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_ne!(hash_password(&a, "secret"), hash_password(&b, "secret"));
        assert!(verify_password(&a, "secret", &hash_password(&a, "secret")));
        assert!(!verify_password(&a, "Secret", &hash_password(&a, "secret")));
    }

    #[test]
    fn test_verify_password_rejects_malformed_hashes() {
        let id = Uuid::new_v4();
        let hash = hash_password(&id, "secret");
        assert!(!verify_password(&id, "secret", &hash[..63]));
        assert!(!verify_password(&id, "secret", &format!("{hash}0")));
        assert!(!verify_password(&id, "secret", ""));
        assert!(!verify_password(&id, "secret", &hash.to_uppercase()));
    }

    #[tokio::test]
    async fn test_store_and_get() {
        let (_dir, store) = store(Bucket::Transfer, 1024).await;
        let file = store
            .store_bytes("報告書.pdf", "application/pdf", None, Bytes::from_static(b"%PDF-1.4"))
            .await
            .unwrap();

        assert_eq!(file.size_bytes, 8);
        assert_eq!(file.checksum.len(), 64);
        assert!(file.stored_name.ends_with("_報告書.pdf"));
        assert!(!file.password_protected());

        let loaded = store.get(&file.id.to_string()).await.unwrap();
        assert_eq!(loaded.original_name, "報告書.pdf");
        assert_eq!(loaded.checksum, file.checksum);
        assert_eq!(
            fs::read(store.file_path(&loaded)).await.unwrap(),
            b"%PDF-1.4"
        );
    }

    #[tokio::test]
    async fn test_store_rejects_oversized_stream() {
        let (_dir, store) = store(Bucket::Transfer, 10).await;
        let chunks = futures::stream::iter(vec![
            Ok::<_, StorageError>(Bytes::from_static(b"123456")),
            Ok(Bytes::from_static(b"789012")),
        ]);

        let err = store
            .store_stream("big.txt", "text/plain", None, chunks)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::TooLarge { limit: 10 }));

        let mut entries = fs::read_dir(store.base_path()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_file_is_not_found_and_purged() {
        let (_dir, store) = store(Bucket::Transfer, 1024).await;
        let file = store
            .store_bytes("a.txt", "text/plain", None, Bytes::from_static(b"hello"))
            .await
            .unwrap();
        let id = file.id.to_string();

        let later = file.expires_at + chrono::Duration::seconds(1);
        assert!(matches!(
            store.get_at(&id, later).await,
            Err(StorageError::NotFound(_))
        ));

        let report = store.purge_expired(later).await.unwrap();
        assert_eq!(report, PurgeReport { files: 1, bytes: 5 });
        assert!(!fs::try_exists(store.file_path(&file)).await.unwrap());
        assert!(matches!(
            store.get(&id).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_purge_keeps_live_files() {
        let (_dir, store) = store(Bucket::Gigafile, 1024).await;
        store
            .store_bytes("a.txt", "text/plain", None, Bytes::from_static(b"x"))
            .await
            .unwrap();

        let report = store.purge_expired(Utc::now()).await.unwrap();
        assert_eq!(report, PurgeReport::default());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_password_gated_download() {
        let (_dir, store) = store(Bucket::Gigafile, 1024).await;
        let file = store
            .store_bytes("a.zip", "application/zip", Some("s3cret"), Bytes::from_static(b"PK"))
            .await
            .unwrap();
        let id = file.id.to_string();
        assert!(file.password_protected());

        assert!(matches!(
            store.open_for_download(&id, None).await,
            Err(StorageError::PasswordRequired)
        ));
        assert!(matches!(
            store.open_for_download(&id, Some("")).await,
            Err(StorageError::PasswordRequired)
        ));
        assert!(matches!(
            store.open_for_download(&id, Some("wrong")).await,
            Err(StorageError::PasswordMismatch)
        ));

        let (opened, path) = store.open_for_download(&id, Some("s3cret")).await.unwrap();
        assert_eq!(opened.downloads, 1);
        assert!(path.ends_with(&opened.stored_name));

        let (opened, _) = store.open_for_download(&id, Some("s3cret")).await.unwrap();
        assert_eq!(opened.downloads, 2);
    }

    #[tokio::test]
    async fn test_missing_body_drops_record() {
        let (_dir, store) = store(Bucket::Transfer, 1024).await;
        let file = store
            .store_bytes("a.txt", "text/plain", None, Bytes::from_static(b"x"))
            .await
            .unwrap();
        fs::remove_file(store.file_path(&file)).await.unwrap();

        assert!(matches!(
            store.get(&file.id.to_string()).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_and_stats() {
        let (_dir, store) = store(Bucket::Gigafile, 1024).await;
        let a = store
            .store_bytes("a.txt", "text/plain", None, Bytes::from_static(b"aaaa"))
            .await
            .unwrap();
        store
            .store_bytes("b.txt", "text/plain", None, Bytes::from_static(b"bb"))
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.total_size_bytes, 6);

        store.delete(&a.id.to_string()).await.unwrap();
        assert!(matches!(
            store.delete(&a.id.to_string()).await,
            Err(StorageError::NotFound(_))
        ));
        assert_eq!(store.stats().await.unwrap().total_files, 1);
    }

    #[tokio::test]
    async fn test_buckets_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.run_migrations().await.unwrap();
        let db = Arc::new(db);
        let retention = Duration::from_secs(3600);
        let transfer = FileStore::new(
            Bucket::Transfer,
            dir.path().join("transfer"),
            db.clone(),
            retention,
            1024,
        );
        let gigafile = FileStore::new(
            Bucket::Gigafile,
            dir.path().join("gigafile"),
            db,
            retention,
            1024,
        );

        let file = transfer
            .store_bytes("a.txt", "text/plain", None, Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert!(gigafile.get(&file.id.to_string()).await.is_err());
        assert!(gigafile.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_orphans_skips_recent_files() {
        let (_dir, store) = store(Bucket::Transfer, 1024).await;
        store
            .store_bytes("kept.txt", "text/plain", None, Bytes::from_static(b"x"))
            .await
            .unwrap();
        fs::write(store.base_path().join("stray.bin"), b"junk")
            .await
            .unwrap();

        assert_eq!(store.cleanup_orphans().await.unwrap(), 0);
        assert!(fs::try_exists(store.base_path().join("stray.bin"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_staged_upload_is_invisible_until_committed() {
        let (_dir, store) = store(Bucket::Gigafile, 1024).await;
        let chunks = futures::stream::iter([Ok::<_, StorageError>(Bytes::from_static(b"secret"))]);
        let staged = store
            .stage_stream("plan.pdf", "application/pdf", chunks)
            .await
            .unwrap();
        let id = staged.id().to_string();

        assert_eq!(staged.size_bytes(), 6);
        assert!(store.list().await.unwrap().is_empty());
        assert!(matches!(store.get(&id).await, Err(StorageError::NotFound(_))));

        let file = store.commit(staged, Some("pw")).await.unwrap();
        assert!(file.password_protected());
        assert!(matches!(
            store.open_for_download(&id, None).await,
            Err(StorageError::PasswordRequired)
        ));
        assert!(store.open_for_download(&id, Some("pw")).await.is_ok());
    }

    #[tokio::test]
    async fn test_discarded_upload_leaves_nothing() {
        let (_dir, store) = store(Bucket::Gigafile, 1024).await;
        let chunks = futures::stream::iter([Ok::<_, StorageError>(Bytes::from_static(b"body"))]);
        let staged = store
            .stage_stream("plan.pdf", "application/pdf", chunks)
            .await
            .unwrap();

        store.discard(staged).await;

        let mut entries = fs::read_dir(store.base_path()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_orphans_removes_abandoned_parts() {
        let (_dir, store) = store(Bucket::Transfer, 1024).await;
        let chunks = futures::stream::iter([Ok::<_, StorageError>(Bytes::from_static(b"half"))]);
        let fresh = store
            .stage_stream("fresh.txt", "text/plain", chunks)
            .await
            .unwrap();

        let stale = store.base_path().join("old_upload.txt.part");
        std::fs::write(&stale, b"half").unwrap();
        let two_hours_ago = std::time::SystemTime::now() - Duration::from_secs(2 * 3600);
        std::fs::File::options()
            .write(true)
            .open(&stale)
            .unwrap()
            .set_modified(two_hours_ago)
            .unwrap();

        assert_eq!(store.cleanup_orphans().await.unwrap(), 1);
        assert!(!fs::try_exists(&stale).await.unwrap());
        store.commit(fresh, None).await.unwrap();
    }
}
