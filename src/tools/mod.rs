//! Tool routers.
//!
//! Each tool exposes a `router()` with paths relative to its mount point.
//! The server nests it under the tool's path prefix, both in the dispatcher
//! and on the tool's standalone port.

pub mod converter;
pub mod gigafile;
pub mod howto;
pub mod nametag;
pub mod pdf;
pub mod proofreading;
pub mod shift;
pub mod toc;
pub mod transfer;

use std::path::Path;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio_util::io::ReaderStream;

use crate::config::ToolKind;
use crate::error::ApiError;
use crate::server::AppState;

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Router for one tool, `None` for the dashboard.
pub fn router_for(kind: ToolKind) -> Option<Router<AppState>> {
    let router = match kind {
        ToolKind::Main => return None,
        ToolKind::Toc => toc::router(),
        ToolKind::Pdf => pdf::router(),
        ToolKind::Shift => shift::router(),
        ToolKind::Nametag => nametag::router(),
        ToolKind::Transfer => transfer::router(),
        ToolKind::Gigafile => gigafile::router(),
        ToolKind::Howto => howto::router(),
        ToolKind::Proofreading => proofreading::router(),
        ToolKind::Converter => converter::router(),
    };
    Some(router)
}

/// `Content-Disposition` for a download. Non-ASCII names go in `filename*`.
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

fn disposition_header(filename: &str) -> HeaderValue {
    HeaderValue::from_str(&content_disposition(filename))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

fn mime_header(mime: &str) -> HeaderValue {
    HeaderValue::from_str(mime).unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
}

/// An in-memory body served as a download.
pub fn attachment(bytes: Vec<u8>, filename: &str, mime: &str) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime_header(mime)),
            (header::CONTENT_DISPOSITION, disposition_header(filename)),
        ],
        bytes,
    )
        .into_response()
}

/// Streams a stored file from disk as a download.
pub async fn file_download(path: &Path, filename: &str, mime: &str) -> Result<Response, ApiError> {
    let file = tokio::fs::File::open(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ApiError::NotFound(format!("file not found: {}", filename))
        } else {
            ApiError::from(e)
        }
    })?;
    let length = file.metadata().await?.len();
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime_header(mime)),
            (header::CONTENT_DISPOSITION, disposition_header(filename)),
            (header::CONTENT_LENGTH, HeaderValue::from(length)),
        ],
        body,
    )
        .into_response())
}
