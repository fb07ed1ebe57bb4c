//! Image and PDF format conversion.

use std::io::Cursor;

use axum::extract::Multipart;
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use chrono::Local;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};

use crate::error::{ApiError, ConvertError, UploadError};
use crate::pdf::{first_page_image, image_to_pdf};
use crate::server::AppState;
use crate::upload::{check_extension, FormData, CONVERTER_EXTENSIONS};

pub fn router() -> Router<AppState> {
    Router::new().route("/upload", post(upload))
}

/// Output resolution preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Quality {
    High,
    #[default]
    Medium,
    Low,
}

impl Quality {
    pub fn dpi(self) -> u32 {
        match self {
            Quality::High => 300,
            Quality::Medium => 200,
            Quality::Low => 96,
        }
    }
}

impl std::str::FromStr for Quality {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Quality::High),
            "medium" => Ok(Quality::Medium),
            "low" => Ok(Quality::Low),
            other => Err(UploadError::InvalidField {
                field: "quality".into(),
                message: format!("'{}' is not high, medium or low", other),
            }),
        }
    }
}

/// Mime type for an output format.
pub fn mime_for(format: &str) -> &'static str {
    match format {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

/// `converted_{YYYYmmddHHMMSS}.{format}` in local time.
pub fn output_filename(format: &str) -> String {
    format!("converted_{}.{}", Local::now().format("%Y%m%d%H%M%S"), format)
}

fn encode(image: &DynamicImage, format: &str) -> Result<Vec<u8>, ConvertError> {
    let mut buffer = Cursor::new(Vec::new());
    match format {
        "jpg" => {
            let rgb = image.to_rgb8();
            JpegEncoder::new_with_quality(&mut buffer, 100).encode_image(&rgb)?;
        }
        _ => image.write_to(&mut buffer, ImageFormat::Png)?,
    }
    Ok(buffer.into_inner())
}

/// Converts `bytes` of type `from` into `to`.
///
/// `from` is the lowercased source extension. Supported pairs are
/// image → pdf, png/jpeg → jpg, jpg/jpeg → png and pdf → jpg/png.
pub fn convert(bytes: &[u8], from: &str, to: &str, quality: Quality) -> Result<Vec<u8>, ConvertError> {
    match (from, to) {
        ("png" | "jpg" | "jpeg", "pdf") => image_to_pdf(bytes, quality.dpi()),
        ("png" | "jpeg", "jpg") | ("jpg" | "jpeg", "png") => {
            let image = image::load_from_memory(bytes)?;
            encode(&image, to)
        }
        ("pdf", "jpg" | "png") => {
            let image = first_page_image(bytes)?;
            encode(&image, to)
        }
        _ => Err(ConvertError::Unsupported {
            from: from.to_string(),
            to: to.to_string(),
        }),
    }
}

async fn upload(mut multipart: Multipart) -> Result<Response, ApiError> {
    let form = FormData::read(&mut multipart).await?;
    let file = form.file("file")?;
    let from = check_extension(&file.filename, CONVERTER_EXTENSIONS)?;
    if file.is_empty() {
        return Err(UploadError::EmptyFilename.into());
    }

    let to = form
        .text("output_format")
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "pdf".to_string());
    let quality: Quality = form.parse_or("quality", Quality::default())?;

    tracing::info!(name = %file.filename, from = %from, to = %to, dpi = quality.dpi(), "Conversion requested");

    let data = file.data.clone();
    let target = to.clone();
    let bytes = tokio::task::spawn_blocking(move || convert(&data, &from, &target, quality))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(super::attachment(bytes, &output_filename(&to), mime_for(&to)))
}
