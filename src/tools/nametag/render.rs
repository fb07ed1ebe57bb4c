//! Preview images and badge PDFs.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object};

use super::design::{Alignment, DesignSettings};
use crate::error::{ConvertError, PdfError};
use crate::pdf::font::{add_japanese_font, encode_text, text_width};
use crate::pdf::{PdfBuilder, A4, MM};

/// Business-card lines used to size the preview placeholders.
pub const SAMPLE_LINES: [&str; 5] = [
    "株式会社サンプル",
    "営業部",
    "山田太郎",
    "Tel: 03-1234-5678",
    "Email: yamada@example.com",
];

/// Length of the preview trim marks in pixels.
const PREVIEW_MARK: u32 = 20;
/// Length of the PDF trim marks in millimetres.
const TRIM_MARK_MM: f32 = 3.0;
/// Inner padding of the card in millimetres.
const PADDING_MM: f32 = 5.0;

fn fill_rect(img: &mut RgbImage, x: i64, y: i64, w: i64, h: i64, color: Rgb<u8>) {
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + w).min(img.width() as i64);
    let y1 = (y + h).min(img.height() as i64);
    for py in y0..y1 {
        for px in x0..x1 {
            img.put_pixel(px as u32, py as u32, color);
        }
    }
}

/// Renders the card at 72 dpi as a PNG.
///
/// There is no glyph rasterizer, so each sample character becomes a block
/// of its advance width.
pub fn preview_png(settings: &DesignSettings) -> Result<Vec<u8>, ConvertError> {
    let width = (settings.card_width * MM).round().max(1.0) as u32;
    let height = (settings.card_height * MM).round().max(1.0) as u32;
    let mut img = RgbImage::from_pixel(width, height, Rgb(settings.background_rgb()));

    let ink = Rgb(settings.text_rgb());
    let size = settings.font_size;
    for (line, pos) in SAMPLE_LINES.iter().zip(&settings.positions) {
        let mut x = pos.x as f32;
        for ch in line.chars() {
            let advance = text_width(ch.encode_utf8(&mut [0; 4]), size);
            if !ch.is_whitespace() {
                fill_rect(
                    &mut img,
                    (x + advance * 0.1) as i64,
                    (pos.y as f32 + size * 0.15) as i64,
                    (advance * 0.8).max(1.0) as i64,
                    (size * 0.7).max(1.0) as i64,
                    ink,
                );
            }
            x += advance;
        }
    }

    let black = Rgb([0, 0, 0]);
    let (w, h, m) = (width as i64, height as i64, PREVIEW_MARK as i64);
    for (cx, cy, dx, dy) in [(0, 0, 1, 1), (w, 0, -1, 1), (0, h, 1, -1), (w, h, -1, -1)] {
        let hx = if dx > 0 { cx } else { cx - m };
        let hy = if dy > 0 { cy } else { cy - 1 };
        fill_rect(&mut img, hx, hy, m, 1, black);
        let vx = if dx > 0 { cx } else { cx - 1 };
        let vy = if dy > 0 { cy } else { cy - m };
        fill_rect(&mut img, vx, vy, 1, m, black);
    }

    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img).write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

/// The preview as a `data:` URL.
pub fn preview_data_url(settings: &DesignSettings) -> Result<String, ConvertError> {
    let png = preview_png(settings)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

fn rgb_operands(rgb: [u8; 3]) -> Vec<Object> {
    rgb.iter()
        .map(|c| Object::Real(*c as f32 / 255.0))
        .collect()
}

fn real(value: f32) -> Object {
    Object::Real(value)
}

/// Content stream operations for one badge.
fn badge_operations(settings: &DesignSettings, lines: &[String]) -> Vec<Operation> {
    let (page_w, page_h) = A4;
    let card_w = settings.card_width * MM;
    let card_h = settings.card_height * MM;
    let x0 = (page_w - card_w) / 2.0;
    let y0 = (page_h - card_h) / 2.0;
    let padding = PADDING_MM * MM;

    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new("rg", rgb_operands(settings.background_rgb())),
        Operation::new("re", vec![real(x0), real(y0), real(card_w), real(card_h)]),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
    ];

    let size = settings.font_size;
    let leading = size * settings.line_spacing;
    let mut baseline = y0 + card_h - padding - size;
    let mut dropped = 0;
    for line in lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        if baseline < y0 + padding {
            dropped += 1;
            continue;
        }

        let width = text_width(line, size);
        let x = match settings.alignment {
            Alignment::Left => x0 + padding,
            Alignment::Center => x0 + (card_w - width) / 2.0,
            Alignment::Right => x0 + card_w - padding - width,
        };

        ops.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), real(size)]),
            Operation::new("rg", rgb_operands(settings.text_rgb())),
            Operation::new("Td", vec![real(x), real(baseline)]),
            Operation::new("Tj", vec![encode_text(line)]),
            Operation::new("ET", vec![]),
        ]);
        baseline -= leading;
    }
    if dropped > 0 {
        tracing::debug!(dropped, "Lines did not fit on the card");
    }

    let mark = TRIM_MARK_MM * MM;
    ops.extend([
        Operation::new("q", vec![]),
        Operation::new("RG", vec![real(0.0), real(0.0), real(0.0)]),
        Operation::new("w", vec![real(0.5)]),
    ]);
    for (cx, cy, dx, dy) in [
        (x0, y0, 1.0, 1.0),
        (x0 + card_w, y0, -1.0, 1.0),
        (x0, y0 + card_h, 1.0, -1.0),
        (x0 + card_w, y0 + card_h, -1.0, -1.0),
    ] {
        ops.extend([
            Operation::new("m", vec![real(cx), real(cy)]),
            Operation::new("l", vec![real(cx + dx * mark), real(cy)]),
            Operation::new("m", vec![real(cx), real(cy)]),
            Operation::new("l", vec![real(cx), real(cy + dy * mark)]),
        ]);
    }
    ops.extend([Operation::new("S", vec![]), Operation::new("Q", vec![])]);

    ops
}

/// One A4 page per row, the card centered on each.
pub fn badges_pdf(settings: &DesignSettings, rows: &[Vec<String>]) -> Result<Vec<u8>, PdfError> {
    let mut builder = PdfBuilder::new();
    let font_id = add_japanese_font(&mut builder);
    let (page_w, page_h) = A4;

    for row in rows {
        let content = Content {
            operations: badge_operations(settings, row),
        };
        let bytes = content
            .encode()
            .map_err(|e| PdfError::Write(e.to_string()))?;
        let resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        };
        builder.add_page(page_w, page_h, bytes, resources);
    }

    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::nametag::design::LINE_COUNT;

    fn row(values: &[&str]) -> Vec<String> {
        let mut row: Vec<String> = values.iter().map(|s| s.to_string()).collect();
        row.resize(LINE_COUNT, String::new());
        row
    }

    #[test]
    fn test_preview_is_png_at_72_dpi() {
        let png = preview_png(&DesignSettings::default()).unwrap();
        let img = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(img.width(), 255);
        assert_eq!(img.height(), 156);
        assert_eq!(img.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(30, 150), &Rgb([255, 255, 255]));
        // First glyph block of line 1 sits near (50, 20).
        assert_eq!(img.get_pixel(55, 25), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_preview_uses_background_color() {
        let settings = DesignSettings {
            background_color: "#336699".into(),
            ..Default::default()
        };
        let png = preview_png(&settings).unwrap();
        let img = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(200, 140), &Rgb([0x33, 0x66, 0x99]));
    }

    #[test]
    fn test_preview_data_url() {
        let url = preview_data_url(&DesignSettings::default()).unwrap();
        assert!(url.starts_with("data:image/png;base64,iVBOR"));
    }

    #[test]
    fn test_badges_pdf_has_page_per_row() {
        let rows = vec![row(&["株式会社サンプル", "山田太郎"]), row(&["Example Inc.", "Jane"])];
        let bytes = badges_pdf(&DesignSettings::default(), &rows).unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_badges_pdf_requires_rows() {
        assert!(matches!(
            badges_pdf(&DesignSettings::default(), &[]),
            Err(PdfError::NoPages)
        ));
    }

    #[test]
    fn test_alignment_moves_text() {
        let line = vec!["ABCD".to_string()];
        let x_of = |alignment| {
            let settings = DesignSettings {
                alignment,
                ..Default::default()
            };
            badge_operations(&settings, &line)
                .into_iter()
                .find(|op| op.operator == "Td")
                .and_then(|op| op.operands[0].as_float().ok())
                .unwrap()
        };
        let left = x_of(Alignment::Left);
        let center = x_of(Alignment::Center);
        let right = x_of(Alignment::Right);
        assert!(left < center && center < right);
    }

    #[test]
    fn test_blank_lines_take_no_space() {
        let ops = badge_operations(&DesignSettings::default(), &row(&["", "A", "", "B"]));
        let shows = ops.iter().filter(|op| op.operator == "Tj").count();
        assert_eq!(shows, 2);
    }
}
