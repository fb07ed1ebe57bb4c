//! Error types for efficepart operations.
//!
//! Each subsystem owns a `thiserror` enum:
//! - Upload validation and multipart handling
//! - PDF page manipulation
//! - Office (OOXML) reading and writing
//! - Shift-table generation
//! - Image/document conversion
//! - LLM API interactions
//!
//! [`ApiError`] is the HTTP-facing error. Every handler returns it and it
//! renders as `{"success": false, "error": "..."}` with a matching status.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::storage::{DatabaseError, StorageError};

/// Errors raised while validating an uploaded file.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no file was uploaded in field '{0}'")]
    MissingFile(String),

    #[error("no file selected")]
    EmptyFilename,

    #[error("file has no extension")]
    MissingExtension,

    #[error("file type not allowed: {extension} (allowed: {allowed})")]
    ExtensionNotAllowed { extension: String, allowed: String },

    #[error("not a valid PDF file: {0}")]
    InvalidPdf(String),

    #[error("file exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },

    #[error("missing form field '{0}'")]
    MissingField(String),

    #[error("invalid value for '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("multipart error: {0}")]
    Multipart(#[from] MultipartError),
}

/// Errors that can occur while manipulating PDF documents.
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    #[error("PDF has no pages")]
    NoPages,

    #[error("no valid pages in range '{0}'")]
    EmptyRange(String),

    #[error("invalid page range '{0}'")]
    InvalidRange(String),

    #[error("page selection exceeds {0} pages")]
    SelectionTooLarge(usize),

    #[error("failed to write PDF: {0}")]
    Write(String),

    #[error("failed to build archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<lopdf::Error> for PdfError {
    fn from(err: lopdf::Error) -> Self {
        PdfError::Parse(err.to_string())
    }
}

/// Errors that can occur while reading or writing OOXML packages.
#[derive(Debug, Error)]
pub enum OfficeError {
    #[error("not a valid office package: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("malformed XML in {part}: {message}")]
    Xml { part: String, message: String },

    #[error("missing package part: {0}")]
    MissingPart(String),

    #[error("workbook has no sheets")]
    NoSheets,

    #[error("missing required columns: {0}")]
    MissingColumns(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while building a shift table.
#[derive(Debug, Error)]
pub enum ShiftError {
    #[error("staff count must be at least 1")]
    NoStaff,

    #[error("staff count must be at most {0}")]
    TooManyStaff(usize),

    #[error("{field} must be at most {limit}")]
    OutOfRange { field: &'static str, limit: u32 },

    #[error("必須ポジション数がスタッフ人数を超えています。")]
    TooManyRequiredPositions,

    #[error("ポジション数の合計（必須 + 臨時）がスタッフ人数を超えています。")]
    TooManyPositions,

    #[error("休憩時間帯は勤務時間内に設定してください。")]
    BreakOutsideWorkHours,

    #[error("work_end must be after work_start")]
    EmptyWorkDay,

    #[error("invalid time '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("shift data is empty")]
    EmptyTable,

    #[error(transparent)]
    Office(#[from] OfficeError),
}

/// Errors that can occur during file conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("unsupported conversion: {from} -> {to}")]
    Unsupported { from: String, to: String },

    #[error("PDF contains no raster image on its first page")]
    NoRasterContent,

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Pdf(#[from] PdfError),
}

impl From<lopdf::Error> for ConvertError {
    fn from(err: lopdf::Error) -> Self {
        ConvertError::Pdf(err.into())
    }
}

/// Errors that can occur during LLM API interactions.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API base URL: LITELLM_API_BASE environment variable not set")]
    MissingApiBase,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Empty response from model")]
    EmptyResponse,
}

/// HTTP-facing error returned by every handler.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }

        let body = Json(serde_json::json!({
            "success": false,
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::TooLarge { .. } => ApiError::PayloadTooLarge(err.to_string()),
            UploadError::Multipart(inner) => {
                if inner.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    ApiError::PayloadTooLarge(inner.body_text())
                } else {
                    ApiError::BadRequest(inner.body_text())
                }
            }
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        UploadError::Multipart(err).into()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => ApiError::NotFound(err.to_string()),
            StorageError::PasswordRequired => ApiError::Unauthorized(err.to_string()),
            StorageError::PasswordMismatch => ApiError::Forbidden(err.to_string()),
            StorageError::TooLarge { .. } => ApiError::PayloadTooLarge(err.to_string()),
            StorageError::Upload(inner) => inner.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<PdfError> for ApiError {
    fn from(err: PdfError) -> Self {
        match err {
            PdfError::Write(_) | PdfError::Archive(_) | PdfError::Io(_) => {
                ApiError::Internal(err.to_string())
            }
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<OfficeError> for ApiError {
    fn from(err: OfficeError) -> Self {
        match err {
            OfficeError::Io(_) => ApiError::Internal(err.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<ShiftError> for ApiError {
    fn from(err: ShiftError) -> Self {
        match err {
            ShiftError::Office(inner) => ApiError::Internal(inner.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<ConvertError> for ApiError {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::Pdf(inner) => inner.into(),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::MissingApiBase => ApiError::ServiceUnavailable(err.to_string()),
            other => ApiError::BadGateway(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}
