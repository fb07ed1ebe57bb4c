//! PDF merge, split, page extraction and info.

use std::io::{Cursor, Write};

use axum::extract::Multipart;
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::attachment;
use crate::error::{ApiError, PdfError, UploadError};
use crate::pdf::{self, PdfInfo};
use crate::server::AppState;
use crate::upload::{validate_pdf, FormData};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/combine", post(combine))
        .route("/split", post(split))
        .route("/extract", post(extract))
        .route("/info", post(info))
}

const PDF_MIME: &str = "application/pdf";

async fn combine(mut multipart: Multipart) -> Result<Response, ApiError> {
    let form = FormData::read(&mut multipart).await?;

    let mut documents = Vec::new();
    for file in form.files("pdf_files") {
        if let Err(e) = validate_pdf(&file.filename, &file.data) {
            tracing::debug!(name = %file.filename, error = %e, "Skipping non-PDF part");
            continue;
        }
        match pdf::load(&file.data) {
            Ok(doc) => documents.push(doc),
            Err(e) => tracing::warn!(name = %file.filename, error = %e, "Skipping unreadable PDF"),
        }
    }

    if documents.is_empty() {
        return Err(ApiError::BadRequest("有効なPDFファイルがありません".to_string()));
    }

    let count = documents.len();
    let merged = tokio::task::spawn_blocking(move || pdf::merge(&documents))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    tracing::info!(files = count, bytes = merged.len(), "Combined PDFs");
    Ok(attachment(merged, "combined.pdf", PDF_MIME))
}

async fn split(mut multipart: Multipart) -> Result<Response, ApiError> {
    let form = FormData::read(&mut multipart).await?;
    let file = form.file("pdf_file")?;
    validate_pdf(&file.filename, &file.data)?;

    let data = file.data.clone();
    let archive = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, PdfError> {
        let doc = pdf::load(&data)?;
        let pages = pdf::split(&doc)?;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (number, bytes) in pages {
            zip.start_file(format!("page_{}.pdf", number), options)?;
            zip.write_all(&bytes)?;
        }
        Ok(zip.finish()?.into_inner())
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    tracing::info!(name = %file.filename, bytes = archive.len(), "Split PDF");
    Ok(attachment(archive, "split_pages.zip", "application/zip"))
}

async fn extract(mut multipart: Multipart) -> Result<Response, ApiError> {
    let form = FormData::read(&mut multipart).await?;
    let file = form.file("pdf_file")?;
    validate_pdf(&file.filename, &file.data)?;

    let ranges = form.text("page_ranges").unwrap_or_default().trim().to_string();
    if ranges.is_empty() {
        return Err(UploadError::MissingField("page_ranges".to_string()).into());
    }

    let data = file.data.clone();
    let ranges_for_task = ranges.clone();
    let extracted = tokio::task::spawn_blocking(move || {
        let doc = pdf::load(&data)?;
        pdf::extract(&doc, &ranges_for_task)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    tracing::info!(name = %file.filename, ranges = %ranges, "Extracted PDF pages");
    Ok(attachment(extracted, "extracted_pages.pdf", PDF_MIME))
}

async fn info(mut multipart: Multipart) -> Result<Json<serde_json::Value>, ApiError> {
    let form = FormData::read(&mut multipart).await?;
    let file = form.file("pdf_file")?;
    validate_pdf(&file.filename, &file.data)?;

    let PdfInfo { pages, version } = pdf::info(&file.data)?;
    Ok(Json(serde_json::json!({
        "success": true,
        "pages": pages,
        "version": version,
    })))
}
