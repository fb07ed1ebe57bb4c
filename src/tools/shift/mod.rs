//! Shift tables: break rotation, styled export and blank calendars.

pub mod calendar;
pub mod excel;
pub mod rotation;

use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;

use super::{attachment, XLSX_MIME};
use crate::error::ApiError;
use crate::server::AppState;

pub use calendar::CalendarRequest;
pub use excel::ExcelRequest;
pub use rotation::{generate, ShiftRequest, ShiftRow, ShiftTable};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", post(generate_table))
        .route("/download_excel", post(download_excel))
        .route("/calendar", post(calendar_workbook))
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    success: bool,
    #[serde(flatten)]
    table: ShiftTable,
}

async fn generate_table(Json(request): Json<ShiftRequest>) -> Result<Json<GenerateResponse>, ApiError> {
    let table = generate(&request)?;
    tracing::info!(
        staff = table.staff_count,
        slots = table.rows.len(),
        "Generated shift table"
    );
    Ok(Json(GenerateResponse {
        success: true,
        table,
    }))
}

async fn download_excel(Json(request): Json<ExcelRequest>) -> Result<Response, ApiError> {
    let bytes = excel::export(&request)?;
    tracing::info!(rows = request.shift_data.len(), bytes = bytes.len(), "Exported shift table");
    Ok(attachment(bytes, "shift_table.xlsx", XLSX_MIME))
}

async fn calendar_workbook(Json(request): Json<CalendarRequest>) -> Result<Response, ApiError> {
    let (bytes, filename) = calendar::export(&request)?;
    Ok(attachment(bytes, &filename, XLSX_MIME))
}
