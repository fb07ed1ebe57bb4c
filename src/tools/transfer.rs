//! File transfer: 2 GB uploads kept for the retention window.

use axum::extract::{Multipart, Path, State};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::file_download;
use crate::error::ApiError;
use crate::metrics::DownloadOutcome;
use crate::server::AppState;
use crate::storage::{Bucket, StorageError, StoredFile};
use crate::upload::{stream_into_store, TRANSFER_EXTENSIONS};

const TOOL: &str = "transfer";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .route("/download/{id}", get(download))
        .route("/files", get(list_files))
        .route("/delete/{id}", delete(delete_file))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub file_id: String,
    pub download_url: String,
    pub expiration_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct FileEntry {
    pub file_id: String,
    pub filename: String,
    pub file_size: u64,
    pub upload_time: DateTime<Utc>,
    pub expiration_time: DateTime<Utc>,
}

impl From<StoredFile> for FileEntry {
    fn from(file: StoredFile) -> Self {
        Self {
            file_id: file.id.to_string(),
            filename: file.original_name,
            file_size: file.size_bytes,
            upload_time: file.uploaded_at,
            expiration_time: file.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FileList {
    pub files: Vec<FileEntry>,
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let store = state.store(Bucket::Transfer);
    let file = stream_into_store(&mut multipart, store, "file", TRANSFER_EXTENSIONS).await?;

    state.metrics.record_upload(TOOL, file.size_bytes);
    tracing::info!(
        file_id = %file.id,
        bytes = file.size_bytes,
        name = %file.original_name,
        "Transfer upload stored"
    );

    Ok(Json(UploadResponse {
        success: true,
        file_id: file.id.to_string(),
        download_url: format!("/transfer/download/{}", file.id),
        expiration_time: file.expires_at,
    }))
}

async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let store = state.store(Bucket::Transfer);
    match store.open_for_download(&id, None).await {
        Ok((file, path)) => {
            state.metrics.record_download(TOOL, DownloadOutcome::Served);
            file_download(&path, &file.original_name, &file.mime_type).await
        }
        Err(e) => {
            if matches!(e, StorageError::NotFound(_)) {
                state.metrics.record_download(TOOL, DownloadOutcome::NotFound);
            }
            Err(e.into())
        }
    }
}

async fn list_files(State(state): State<AppState>) -> Result<Json<FileList>, ApiError> {
    let files = state.store(Bucket::Transfer).list().await?;
    Ok(Json(FileList {
        files: files.into_iter().map(FileEntry::from).collect(),
    }))
}

async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let file = state.store(Bucket::Transfer).delete(&id).await?;
    tracing::info!(file_id = %file.id, "Transfer file deleted");
    Ok(Json(serde_json::json!({ "success": true })))
}
