//! Table of contents from presentation slide titles.

use axum::extract::Multipart;
use axum::routing::post;
use axum::{Json, Router};
use quick_xml::escape::escape;
use serde::Serialize;

use crate::error::{ApiError, UploadError};
use crate::office::{presentation_slides, SlideText};
use crate::server::AppState;
use crate::upload::{check_extension, FormData};

pub fn router() -> Router<AppState> {
    Router::new().route("/upload", post(upload))
}

/// One line of the generated contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub number: usize,
    pub title: String,
    /// 1-based slide the title was taken from.
    pub slide: usize,
}

/// Per-entry styling from the repeated `toc_font_size[]`/`toc_bold[]` fields.
#[derive(Debug, Clone, Default)]
pub struct TocStyle {
    pub font_sizes: Vec<u32>,
    pub bold: Vec<bool>,
}

impl TocStyle {
    /// Entry `idx` uses the value at `idx`, else the last one given.
    fn font_size(&self, idx: usize) -> Option<u32> {
        self.font_sizes.get(idx).or(self.font_sizes.last()).copied()
    }

    fn bold(&self, idx: usize) -> bool {
        self.bold.get(idx).or(self.bold.last()).copied().unwrap_or(false)
    }

    fn from_form(form: &FormData) -> Self {
        let font_sizes = form
            .texts("toc_font_size[]")
            .iter()
            .filter_map(|v| v.trim().parse().ok())
            .collect();
        let bold = form
            .texts("toc_bold[]")
            .iter()
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "on" | "1" | "bold"))
            .collect();
        Self { font_sizes, bold }
    }
}

/// Entries for every slide that has a heading.
pub fn build_entries(slides: &[SlideText]) -> Vec<TocEntry> {
    slides
        .iter()
        .filter_map(|slide| slide.heading().map(|h| (slide.index, h)))
        .enumerate()
        .map(|(i, (slide, title))| TocEntry {
            number: i + 1,
            title: title.to_string(),
            slide,
        })
        .collect()
}

/// HTML list of the entries. Titles are escaped.
pub fn render_html(entries: &[TocEntry], style: &TocStyle) -> String {
    let mut html = String::from(
        "<div class=\"toc-result-container\"><h3>生成された目次</h3><div class=\"toc-preview\"><ul class=\"toc-list\">",
    );
    for (idx, entry) in entries.iter().enumerate() {
        let mut css = Vec::new();
        if let Some(size) = style.font_size(idx) {
            css.push(format!("font-size: {}pt", size));
        }
        if style.bold(idx) {
            css.push("font-weight: bold".to_string());
        }
        let style_attr = if css.is_empty() {
            String::new()
        } else {
            format!(" style=\"{}\"", css.join("; "))
        };

        html.push_str(&format!(
            "<li class=\"toc-item\"{}><span class=\"toc-number\">{}.</span> <span class=\"toc-text\">{}</span> <span class=\"toc-slide\">{}</span></li>",
            style_attr,
            entry.number,
            escape(entry.title.as_str()),
            entry.slide
        ));
    }
    html.push_str("</ul></div></div>");
    html
}

#[derive(Debug, Serialize)]
struct TocResponse {
    success: bool,
    message: &'static str,
    entries: Vec<TocEntry>,
    toc_html: String,
}

async fn upload(mut multipart: Multipart) -> Result<Json<TocResponse>, ApiError> {
    let form = FormData::read(&mut multipart).await?;
    let file = form.file("file")?;
    check_extension(&file.filename, &["pptx"])
        .map_err(|_| ApiError::BadRequest("PPTXファイルのみアップロードできます。".to_string()))?;
    if file.is_empty() {
        return Err(UploadError::EmptyFilename.into());
    }

    let data = file.data.clone();
    let slides = tokio::task::spawn_blocking(move || presentation_slides(&data))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    let entries = build_entries(&slides);
    let style = TocStyle::from_form(&form);
    let toc_html = render_html(&entries, &style);

    tracing::info!(
        name = %file.filename,
        slides = slides.len(),
        entries = entries.len(),
        "Generated table of contents"
    );

    Ok(Json(TocResponse {
        success: true,
        message: "目次が正常に生成されました。",
        entries,
        toc_html,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slide(index: usize, title: Option<&str>, texts: &[&str]) -> SlideText {
        SlideText {
            index,
            title: title.map(str::to_string),
            texts: texts.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_entries_skip_slides_without_text() {
        let slides = vec![
            slide(1, Some("表紙"), &["表紙"]),
            slide(2, None, &[]),
            slide(3, None, &["本文の最初"]),
        ];
        let entries = build_entries(&slides);
        assert_eq!(
            entries,
            vec![
                TocEntry { number: 1, title: "表紙".into(), slide: 1 },
                TocEntry { number: 2, title: "本文の最初".into(), slide: 3 },
            ]
        );
    }

    #[test]
    fn test_html_is_escaped_and_styled() {
        let entries = vec![TocEntry {
            number: 1,
            title: "<script>A & B</script>".into(),
            slide: 2,
        }];
        let style = TocStyle {
            font_sizes: vec![18],
            bold: vec![true],
        };
        let html = render_html(&entries, &style);
        assert!(html.contains("&lt;script&gt;A &amp; B&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("font-size: 18pt; font-weight: bold"));
    }

    #[test]
    fn test_style_falls_back_to_last_value() {
        let style = TocStyle {
            font_sizes: vec![20, 14],
            bold: vec![],
        };
        assert_eq!(style.font_size(0), Some(20));
        assert_eq!(style.font_size(5), Some(14));
        assert!(!style.bold(0));
    }
}
