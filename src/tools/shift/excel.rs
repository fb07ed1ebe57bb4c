//! Styled workbook export of an edited shift table.

use std::collections::HashMap;

use serde::Deserialize;

use super::rotation::circled_number;
use crate::error::ShiftError;
use crate::office::{BorderStyle, Borders, CellStyle, Workbook, Worksheet};

const HEADER_FILL: &str = "F2F2F2";
const SHEET_NAME: &str = "シフト表";

/// Body of `POST /download_excel`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExcelRequest {
    /// Table as shown in the browser; row 0 is the header row.
    pub shift_data: Vec<Vec<serde_json::Value>>,
    /// Cell value to `#RRGGBB` fill.
    #[serde(default)]
    pub color_map: HashMap<String, String>,
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn borders(left: BorderStyle, right: BorderStyle, top: BorderStyle, bottom: BorderStyle) -> Borders {
    Borders {
        left,
        right,
        top,
        bottom,
    }
}

/// Renders the table into a worksheet.
///
/// The header row becomes circled staff numbers. Data rows get a dashed grid
/// inside a medium frame, with a medium rule above every full hour.
pub fn build_sheet(request: &ExcelRequest) -> Result<Worksheet, ShiftError> {
    use BorderStyle::{Dashed, Medium};

    let header = request.shift_data.first().ok_or(ShiftError::EmptyTable)?;
    let columns = header.len().max(1) as u32;
    let staff_count = columns as usize - 1;
    let total_rows = request.shift_data.len() as u32;

    let mut sheet = Worksheet::new(SHEET_NAME);

    sheet.set_row_height(1, 23.0);
    sheet.set_row_height(2, 30.0);
    for row in 3..=total_rows + 1 {
        sheet.set_row_height(row, 23.0);
    }
    sheet.set_col_width(1, 8.0);
    for col in 2..=columns {
        sheet.set_col_width(col, 15.0);
    }

    let first_row =
        std::iter::once(String::new()).chain((1..=staff_count).map(circled_number));
    for (idx, value) in first_row.enumerate() {
        let col = idx as u32 + 1;
        let border = if col == 1 {
            borders(Medium, Dashed, Medium, Medium)
        } else if col == columns {
            borders(Dashed, Medium, Medium, Medium)
        } else {
            borders(Dashed, Dashed, Medium, Medium)
        };
        let mut style = CellStyle::new().centered().with_borders(border);
        if col > 1 {
            style = style.with_fill(HEADER_FILL);
        }
        sheet.set(1, col, value, style);
    }

    for (offset, row_data) in request.shift_data.iter().skip(1).enumerate() {
        let row = offset as u32 + 2;
        let hour_boundary = row_data
            .first()
            .map(cell_text)
            .is_some_and(|t| t.ends_with(":00"));
        let last_row = row == total_rows;
        let row_len = row_data.len() as u32;
        let top = if hour_boundary { Medium } else { Dashed };

        for (idx, value) in row_data.iter().enumerate() {
            let col = idx as u32 + 1;
            let text = cell_text(value);

            let border = if last_row {
                if col == 1 {
                    borders(Medium, Dashed, Dashed, Medium)
                } else if col == row_len {
                    borders(Dashed, Medium, Dashed, Medium)
                } else {
                    borders(Dashed, Dashed, Dashed, Medium)
                }
            } else if col == 1 {
                borders(Medium, Medium, top, Dashed)
            } else if col == row_len {
                borders(Dashed, Medium, top, Dashed)
            } else {
                borders(Dashed, Dashed, top, Dashed)
            };

            let mut style = CellStyle::new().centered().with_borders(border);
            if row == 2 {
                style = style.bold();
            }
            if let Some(color) = request.color_map.get(&text) {
                style = style.with_fill(color);
            }
            sheet.set(row, col, text, style);
        }
    }

    Ok(sheet)
}

/// `.xlsx` bytes for the table.
pub fn export(request: &ExcelRequest) -> Result<Vec<u8>, ShiftError> {
    let mut workbook = Workbook::new();
    workbook.add_sheet(build_sheet(request)?);
    Ok(workbook.to_bytes()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::office::read_first_sheet;
    use serde_json::json;

    fn sample() -> ExcelRequest {
        serde_json::from_value(json!({
            "shift_data": [
                ["時間", "①", "②"],
                ["名前", "山田", "佐藤"],
                ["09:45", "レジ", "休憩"],
                ["10:00", "休憩", "レジ"],
            ],
            "color_map": { "休憩": "#FFCC00" }
        }))
        .unwrap()
    }

    #[test]
    fn test_header_row_uses_circled_numbers_on_gray() {
        let sheet = build_sheet(&sample()).unwrap();
        assert_eq!(sheet.value(1, 1), Some(""));
        assert_eq!(sheet.value(1, 2), Some("①"));
        assert_eq!(sheet.value(1, 3), Some("②"));
        assert_eq!(sheet.style(1, 2).unwrap().fill.as_deref(), Some("F2F2F2"));
        assert_eq!(sheet.style(1, 1).unwrap().fill, None);
    }

    #[test]
    fn test_second_row_bold_and_colors_applied() {
        let sheet = build_sheet(&sample()).unwrap();
        assert!(sheet.style(2, 2).unwrap().bold);
        assert!(!sheet.style(3, 2).unwrap().bold);
        assert_eq!(sheet.style(3, 3).unwrap().fill.as_deref(), Some("FFCC00"));
        assert_eq!(sheet.style(3, 2).unwrap().fill, None);
    }

    #[test]
    fn test_hour_rows_get_medium_top_border() {
        let sheet = build_sheet(&sample()).unwrap();
        assert_eq!(sheet.style(3, 2).unwrap().borders.top, BorderStyle::Dashed);
        // Row 4 is both the last row and an hour boundary; the last-row frame wins.
        assert_eq!(sheet.style(4, 2).unwrap().borders.bottom, BorderStyle::Medium);
        assert_eq!(sheet.style(4, 1).unwrap().borders.left, BorderStyle::Medium);
    }

    #[test]
    fn test_dimensions() {
        let sheet = build_sheet(&sample()).unwrap();
        assert_eq!(sheet.col_width(1), Some(8.0));
        assert_eq!(sheet.col_width(3), Some(15.0));
        assert_eq!(sheet.row_height(2), Some(30.0));
        assert_eq!(sheet.row_height(4), Some(23.0));
    }

    #[test]
    fn test_export_reads_back() {
        let bytes = export(&sample()).unwrap();
        let rows = read_first_sheet(&bytes).unwrap();
        assert_eq!(rows[0], vec!["", "①", "②"]);
        assert_eq!(rows[3], vec!["10:00", "休憩", "レジ"]);
    }

    #[test]
    fn test_empty_table_rejected() {
        let request = ExcelRequest {
            shift_data: vec![],
            color_map: HashMap::new(),
        };
        assert!(matches!(export(&request), Err(ShiftError::EmptyTable)));
    }
}
