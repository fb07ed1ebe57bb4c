//! PDF page manipulation on top of `lopdf`.
//!
//! - [`pages`]: merge, split and extract by copying pages into new documents
//! - [`raster`]: image to PDF and back
//! - [`font`]: Japanese CID text for generated pages

pub mod font;
pub mod pages;
pub mod raster;

use serde::Serialize;

use crate::error::PdfError;

pub use pages::{extract, load, merge, parse_page_ranges, split, PdfBuilder};
pub use raster::{first_page_image, image_to_pdf, page_size_for};

/// Points per millimetre.
pub const MM: f32 = 72.0 / 25.4;

/// A4 portrait in points.
pub const A4: (f32, f32) = (595.276, 841.89);

/// Summary of a PDF.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PdfInfo {
    pub pages: usize,
    pub version: String,
}

/// Page count and header version.
pub fn info(bytes: &[u8]) -> Result<PdfInfo, PdfError> {
    let doc = load(bytes)?;
    Ok(PdfInfo {
        pages: doc.get_pages().len(),
        version: doc.version.clone(),
    })
}

/// Text of every page, pages separated by newlines.
///
/// Pages whose text cannot be decoded are skipped.
pub fn document_text(bytes: &[u8]) -> Result<String, PdfError> {
    let doc = load(bytes)?;
    let mut out = Vec::new();
    for number in doc.get_pages().keys() {
        match doc.extract_text(&[*number]) {
            Ok(text) => out.push(text.trim_end().to_string()),
            Err(e) => tracing::debug!(page = number, error = %e, "skipping page text"),
        }
    }
    Ok(out.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::pages::tests::sample_pdf;

    #[test]
    fn test_info() {
        let info = info(&sample_pdf(3)).unwrap();
        assert_eq!(info.pages, 3);
        assert_eq!(info.version, "1.5");
    }

    #[test]
    fn test_document_text_joins_pages() {
        let text = document_text(&sample_pdf(2)).unwrap();
        assert!(text.contains("Page 1"));
        assert!(text.contains("Page 2"));
    }

    #[test]
    fn test_mm_conversion() {
        assert!((90.0 * MM - 255.118).abs() < 0.01);
    }
}
