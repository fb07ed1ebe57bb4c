//! Badge layout settings.

use serde::{Deserialize, Serialize};

use crate::error::UploadError;
use crate::office::xlsx::normalize_rgb;
use crate::upload::FormData;

/// Number of text lines on a badge.
pub const LINE_COUNT: usize = 10;

/// Header names of the workbook columns, `1行目` to `10行目`.
pub fn line_columns() -> Vec<String> {
    (1..=LINE_COUNT).map(|n| format!("{}行目", n)).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Alignment {
    Left,
    #[default]
    Center,
    Right,
}

impl std::str::FromStr for Alignment {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LEFT" => Ok(Alignment::Left),
            "CENTER" => Ok(Alignment::Center),
            "RIGHT" => Ok(Alignment::Right),
            other => Err(UploadError::InvalidField {
                field: "alignment".into(),
                message: format!("'{}' is not LEFT, CENTER or RIGHT", other),
            }),
        }
    }
}

/// Preview position of one line, in pixels from the card's top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinePosition {
    pub x: i32,
    pub y: i32,
}

fn default_positions() -> Vec<LinePosition> {
    (1..=LINE_COUNT as i32)
        .map(|n| LinePosition { x: 50, y: 20 * n })
        .collect()
}

/// Everything that shapes a badge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignSettings {
    /// Uploaded workbook the PDF is generated from.
    pub file_id: Option<String>,
    /// Card size in millimetres.
    pub card_width: f32,
    pub card_height: f32,
    pub font_name: String,
    /// Font size in points.
    pub font_size: f32,
    pub line_spacing: f32,
    pub text_color: String,
    pub background_color: String,
    pub alignment: Alignment,
    pub positions: Vec<LinePosition>,
}

impl Default for DesignSettings {
    fn default() -> Self {
        Self {
            file_id: None,
            card_width: 90.0,
            card_height: 55.0,
            font_name: "NotoSansJP-Regular".to_string(),
            font_size: 12.0,
            line_spacing: 1.2,
            text_color: "#000000".to_string(),
            background_color: "#FFFFFF".to_string(),
            alignment: Alignment::Center,
            positions: default_positions(),
        }
    }
}

fn invalid(field: &str, message: impl Into<String>) -> UploadError {
    UploadError::InvalidField {
        field: field.to_string(),
        message: message.into(),
    }
}

impl DesignSettings {
    /// Reads the design form, falling back to defaults field by field.
    pub fn from_form(form: &FormData) -> Result<Self, UploadError> {
        let defaults = Self::default();

        let mut positions = Vec::with_capacity(LINE_COUNT);
        for (idx, default) in defaults.positions.iter().enumerate() {
            let n = idx + 1;
            positions.push(LinePosition {
                x: form.parse_or(&format!("{}_x", n), default.x)?,
                y: form.parse_or(&format!("{}_y", n), default.y)?,
            });
        }

        let alignment = match form.text("alignment") {
            Some(value) if !value.trim().is_empty() => value.parse()?,
            _ => defaults.alignment,
        };

        let text = |field: &str, default: &str| {
            form.text(field)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
                .to_string()
        };

        Self {
            file_id: form.text("file_id").map(str::to_string),
            card_width: form.parse_or("card_width", defaults.card_width)?,
            card_height: form.parse_or("card_height", defaults.card_height)?,
            font_name: text("font_name", &defaults.font_name),
            font_size: form.parse_or("font_size", defaults.font_size)?,
            line_spacing: form.parse_or("line_spacing", defaults.line_spacing)?,
            text_color: text("text_color", &defaults.text_color),
            background_color: text("background_color", &defaults.background_color),
            alignment,
            positions,
        }
        .normalized()
    }

    /// Validates ranges and canonicalizes colors to `#RRGGBB`.
    pub fn normalized(mut self) -> Result<Self, UploadError> {
        for (field, value, max) in [
            ("card_width", self.card_width, 210.0),
            ("card_height", self.card_height, 297.0),
        ] {
            if !(value > 0.0 && value <= max) {
                return Err(invalid(field, format!("must be between 0 and {} mm", max)));
            }
        }
        if !(self.font_size > 0.0 && self.font_size <= 144.0) {
            return Err(invalid("font_size", "must be between 0 and 144"));
        }
        if !(self.line_spacing > 0.0 && self.line_spacing <= 10.0) {
            return Err(invalid("line_spacing", "must be between 0 and 10"));
        }

        self.text_color = format!(
            "#{}",
            normalize_rgb(&self.text_color)
                .ok_or_else(|| invalid("text_color", "expected #RRGGBB"))?
        );
        self.background_color = format!(
            "#{}",
            normalize_rgb(&self.background_color)
                .ok_or_else(|| invalid("background_color", "expected #RRGGBB"))?
        );

        let defaults = default_positions();
        self.positions.truncate(LINE_COUNT);
        while self.positions.len() < LINE_COUNT {
            self.positions.push(defaults[self.positions.len()]);
        }

        Ok(self)
    }

    pub fn text_rgb(&self) -> [u8; 3] {
        parse_color(&self.text_color).unwrap_or([0, 0, 0])
    }

    pub fn background_rgb(&self) -> [u8; 3] {
        parse_color(&self.background_color).unwrap_or([255, 255, 255])
    }
}

/// `#RRGGBB` to bytes.
pub fn parse_color(value: &str) -> Option<[u8; 3]> {
    let hex = normalize_rgb(value)?;
    let bytes = hex::decode(hex).ok()?;
    Some([bytes[0], bytes[1], bytes[2]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = DesignSettings::default();
        assert_eq!(settings.card_width, 90.0);
        assert_eq!(settings.alignment, Alignment::Center);
        assert_eq!(settings.positions.len(), LINE_COUNT);
        assert_eq!(settings.positions[2], LinePosition { x: 50, y: 60 });
    }

    #[test]
    fn test_json_fills_missing_fields() {
        let settings: DesignSettings =
            serde_json::from_str(r##"{"font_size": 16, "alignment": "LEFT", "text_color": "#ff0000"}"##)
                .unwrap();
        let settings = settings.normalized().unwrap();
        assert_eq!(settings.font_size, 16.0);
        assert_eq!(settings.alignment, Alignment::Left);
        assert_eq!(settings.text_color, "#FF0000");
        assert_eq!(settings.card_height, 55.0);
        assert_eq!(settings.text_rgb(), [255, 0, 0]);
    }

    #[test]
    fn test_normalized_rejects_bad_values() {
        let bad_color = DesignSettings {
            background_color: "white".into(),
            ..Default::default()
        };
        assert!(bad_color.normalized().is_err());

        let bad_size = DesignSettings {
            card_width: 0.0,
            ..Default::default()
        };
        assert!(bad_size.normalized().is_err());
    }

    #[test]
    fn test_positions_are_padded() {
        let settings = DesignSettings {
            positions: vec![LinePosition { x: 1, y: 2 }],
            ..Default::default()
        }
        .normalized()
        .unwrap();
        assert_eq!(settings.positions.len(), LINE_COUNT);
        assert_eq!(settings.positions[0], LinePosition { x: 1, y: 2 });
        assert_eq!(settings.positions[1], LinePosition { x: 50, y: 40 });
    }

    #[test]
    fn test_alignment_parse() {
        assert_eq!("right".parse::<Alignment>().unwrap(), Alignment::Right);
        assert!("middle".parse::<Alignment>().is_err());
    }

    #[test]
    fn test_line_columns() {
        let cols = line_columns();
        assert_eq!(cols[0], "1行目");
        assert_eq!(cols[9], "10行目");
    }
}
