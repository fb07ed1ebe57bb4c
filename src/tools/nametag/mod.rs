//! Name-tag badges from a workbook of up to ten lines per person.
//!
//! The flow is upload, then design, then preview, then PDF. Uploaded rows
//! are kept in the database under a `file_id` until the retention sweep.

pub mod design;
pub mod render;

use axum::extract::{Multipart, State};
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{ApiError, OfficeError, UploadError};
use crate::office::read_first_sheet;
use crate::server::AppState;
use crate::storage::{DatabaseError, NametagBatch};
use crate::upload::{check_extension, FormData};

pub use design::{line_columns, Alignment, DesignSettings, LinePosition, LINE_COUNT};
pub use render::{badges_pdf, preview_data_url, preview_png};

/// Rows shown back to the browser after an upload.
const PREVIEW_ROWS: usize = 5;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .route("/select_design", post(select_design))
        .route("/generate_preview", post(generate_preview))
        .route("/generate_pdf", post(generate_pdf))
}

/// Maps the sheet to ten-line rows keyed by the `n行目` header columns.
///
/// Missing columns read as empty strings. Fails only when no column
/// matches. Rows that are empty in every line column are skipped.
pub fn badge_rows(sheet: &[Vec<String>]) -> Result<Vec<Vec<String>>, OfficeError> {
    let Some((header, body)) = sheet.split_first() else {
        return Err(OfficeError::MissingColumns(line_columns().join(", ")));
    };

    let indices: Vec<Option<usize>> = line_columns()
        .iter()
        .map(|name| header.iter().position(|h| h.trim() == name))
        .collect();
    if indices.iter().all(Option::is_none) {
        return Err(OfficeError::MissingColumns(line_columns().join(", ")));
    }

    let missing: Vec<String> = line_columns()
        .into_iter()
        .zip(&indices)
        .filter(|(_, idx)| idx.is_none())
        .map(|(name, _)| name)
        .collect();
    if !missing.is_empty() {
        tracing::debug!(missing = %missing.join(", "), "Workbook lacks some line columns");
    }

    Ok(body
        .iter()
        .map(|cells| {
            indices
                .iter()
                .map(|idx| {
                    idx.and_then(|i| cells.get(i))
                        .map(|v| v.trim().to_string())
                        .unwrap_or_default()
                })
                .collect::<Vec<String>>()
        })
        .filter(|row| row.iter().any(|v| !v.is_empty()))
        .collect())
}

fn preview_rows(rows: &[Vec<String>]) -> Vec<Map<String, Value>> {
    let columns = line_columns();
    rows.iter()
        .take(PREVIEW_ROWS)
        .map(|row| {
            columns
                .iter()
                .zip(row)
                .map(|(name, value)| (name.clone(), Value::String(value.clone())))
                .collect()
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    success: bool,
    file_id: String,
    rows: usize,
    preview_data: Vec<Map<String, Value>>,
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let form = FormData::read(&mut multipart).await?;
    let file = form.file("file")?;
    check_extension(&file.filename, &["xlsx"])?;
    if file.is_empty() {
        return Err(UploadError::EmptyFilename.into());
    }

    let data = file.data.clone();
    let rows = tokio::task::spawn_blocking(move || {
        read_first_sheet(&data).and_then(|sheet| badge_rows(&sheet))
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    let batch = NametagBatch {
        id: Uuid::new_v4().to_string(),
        source_name: file.filename.clone(),
        rows,
        created_at: Utc::now(),
    };
    state.db.save_nametag_batch(&batch).await?;

    tracing::info!(
        file_id = %batch.id,
        name = %batch.source_name,
        rows = batch.rows.len(),
        "Stored name-tag workbook"
    );

    Ok(Json(UploadResponse {
        success: true,
        preview_data: preview_rows(&batch.rows),
        rows: batch.rows.len(),
        file_id: batch.id,
    }))
}

async fn select_design(mut multipart: Multipart) -> Result<Json<DesignSettings>, ApiError> {
    let form = FormData::read(&mut multipart).await?;
    Ok(Json(DesignSettings::from_form(&form)?))
}

#[derive(Debug, Serialize)]
struct PreviewResponse {
    success: bool,
    preview_image: String,
}

async fn generate_preview(
    Json(settings): Json<DesignSettings>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let settings = settings.normalized()?;
    let preview_image = tokio::task::spawn_blocking(move || preview_data_url(&settings))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(PreviewResponse {
        success: true,
        preview_image,
    }))
}

async fn generate_pdf(
    State(state): State<AppState>,
    Json(settings): Json<DesignSettings>,
) -> Result<Response, ApiError> {
    let settings = settings.normalized()?;
    let file_id = settings
        .file_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| UploadError::MissingField("file_id".to_string()))?;

    let batch = match state.db.get_nametag_batch(&file_id).await {
        Ok(batch) => batch,
        Err(DatabaseError::NotFound(_)) => {
            return Err(ApiError::NotFound(format!("file not found: {}", file_id)))
        }
        Err(e) => return Err(e.into()),
    };
    if batch.rows.is_empty() {
        return Err(ApiError::BadRequest("ワークブックに名札データがありません".to_string()));
    }

    let rows = batch.rows;
    let count = rows.len();
    let bytes = tokio::task::spawn_blocking(move || badges_pdf(&settings, &rows))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    tracing::info!(file_id = %file_id, badges = count, "Generated name-tag PDF");
    Ok(super::attachment(bytes, "nametags.pdf", "application/pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_badge_rows_maps_columns_by_header() {
        let sheet = sheet(&[
            &["備考", "2行目", "1行目"],
            &["x", "山田太郎", "株式会社サンプル"],
            &["", "", ""],
            &["y", "佐藤花子", ""],
        ]);
        let rows = badge_rows(&sheet).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), LINE_COUNT);
        assert_eq!(rows[0][0], "株式会社サンプル");
        assert_eq!(rows[0][1], "山田太郎");
        assert_eq!(rows[0][2], "");
        assert_eq!(rows[1][1], "佐藤花子");
    }

    #[test]
    fn test_badge_rows_requires_some_column() {
        let sheet = sheet(&[&["名前", "会社"], &["a", "b"]]);
        assert!(matches!(badge_rows(&sheet), Err(OfficeError::MissingColumns(_))));
        assert!(badge_rows(&[]).is_err());
    }

    #[test]
    fn test_preview_rows_are_keyed_and_capped() {
        let rows: Vec<Vec<String>> = (0..8)
            .map(|i| {
                let mut row = vec![format!("会社{}", i)];
                row.resize(LINE_COUNT, String::new());
                row
            })
            .collect();
        let preview = preview_rows(&rows);
        assert_eq!(preview.len(), PREVIEW_ROWS);
        assert_eq!(preview[1]["1行目"], Value::String("会社1".into()));
        assert_eq!(preview[0].len(), LINE_COUNT);
    }
}
