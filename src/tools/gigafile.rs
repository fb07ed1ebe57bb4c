//! Large-file transfer with optional download passwords.

use axum::extract::{Multipart, Path, Query, State};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::file_download;
use crate::error::ApiError;
use crate::metrics::DownloadOutcome;
use crate::server::AppState;
use crate::storage::{Bucket, FileStats, StorageError, StoredFile};
use crate::upload::{stream_into_store, GIGAFILE_EXTENSIONS};

const TOOL: &str = "gigafile";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .route("/download/{id}", get(download))
        .route("/files", get(list_files))
        .route("/delete/{id}", delete(delete_file))
        .route("/api/stats", get(stats))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub file_id: String,
    pub download_url: String,
    pub expiration_date: DateTime<Utc>,
    pub password_protected: bool,
}

/// Listing entry. Never carries the password hash.
#[derive(Debug, Serialize)]
pub struct FileEntry {
    pub file_id: String,
    pub original_name: String,
    pub mime_type: String,
    pub file_size: u64,
    pub upload_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    pub downloads: u64,
    pub password_protected: bool,
}

impl From<StoredFile> for FileEntry {
    fn from(file: StoredFile) -> Self {
        let password_protected = file.password_protected();
        Self {
            file_id: file.id.to_string(),
            original_name: file.original_name,
            mime_type: file.mime_type,
            file_size: file.size_bytes,
            upload_date: file.uploaded_at,
            expiration_date: file.expires_at,
            downloads: file.downloads,
            password_protected,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FileList {
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub password: Option<String>,
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let store = state.store(Bucket::Gigafile);
    let file = stream_into_store(&mut multipart, store, "file", GIGAFILE_EXTENSIONS).await?;

    state.metrics.record_upload(TOOL, file.size_bytes);
    tracing::info!(
        file_id = %file.id,
        bytes = file.size_bytes,
        password = file.password_protected(),
        "Gigafile upload stored"
    );

    Ok(Json(UploadResponse {
        success: true,
        file_id: file.id.to_string(),
        download_url: format!("/gigafile/download/{}", file.id),
        expiration_date: file.expires_at,
        password_protected: file.password_protected(),
    }))
}

async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let store = state.store(Bucket::Gigafile);
    match store.open_for_download(&id, query.password.as_deref()).await {
        Ok((file, path)) => {
            state.metrics.record_download(TOOL, DownloadOutcome::Served);
            tracing::info!(file_id = %file.id, downloads = file.downloads, "Gigafile download");
            file_download(&path, &file.original_name, &file.mime_type).await
        }
        Err(e) => {
            let outcome = match e {
                StorageError::NotFound(_) => Some(DownloadOutcome::NotFound),
                StorageError::PasswordRequired => Some(DownloadOutcome::PasswordRequired),
                StorageError::PasswordMismatch => Some(DownloadOutcome::PasswordMismatch),
                _ => None,
            };
            if let Some(outcome) = outcome {
                state.metrics.record_download(TOOL, outcome);
            }
            Err(e.into())
        }
    }
}

async fn list_files(State(state): State<AppState>) -> Result<Json<FileList>, ApiError> {
    let files = state.store(Bucket::Gigafile).list().await?;
    Ok(Json(FileList {
        files: files.into_iter().map(FileEntry::from).collect(),
    }))
}

async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let file = state.store(Bucket::Gigafile).delete(&id).await?;
    tracing::info!(file_id = %file.id, "Gigafile file deleted");
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "ファイルが削除されました",
    })))
}

async fn stats(State(state): State<AppState>) -> Result<Json<FileStats>, ApiError> {
    Ok(Json(state.store(Bucket::Gigafile).stats().await?))
}
