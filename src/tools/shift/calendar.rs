//! Blank weekly staff calendar.

use chrono::{Days, Local, NaiveDate};
use serde::Deserialize;

use crate::error::ShiftError;
use crate::office::{BorderStyle, Borders, CellStyle, Workbook, Worksheet};

const HEADER_FILL: &str = "CCCCCC";

/// Longest calendar, one leap year.
pub const MAX_DAYS: u32 = 366;

pub const MAX_WORKERS: u32 = 500;

fn default_days() -> u32 {
    7
}

fn default_workers() -> u32 {
    10
}

/// Body of `POST /calendar`.
#[derive(Debug, Clone, Deserialize)]
pub struct CalendarRequest {
    /// `YYYY-MM-DD`; today when absent.
    pub start_date: Option<String>,
    #[serde(default = "default_days")]
    pub num_days: u32,
    #[serde(default = "default_workers")]
    pub num_workers: u32,
}

/// First day of the calendar.
pub fn start_date(request: &CalendarRequest) -> Result<NaiveDate, ShiftError> {
    match request.start_date.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| ShiftError::InvalidDate(s.to_string())),
        _ => Ok(Local::now().date_naive()),
    }
}

/// Header row of dates and one row per worker, all empty cells bordered.
pub fn build_sheet(request: &CalendarRequest) -> Result<Worksheet, ShiftError> {
    if request.num_days > MAX_DAYS {
        return Err(ShiftError::OutOfRange {
            field: "num_days",
            limit: MAX_DAYS,
        });
    }
    if request.num_workers > MAX_WORKERS {
        return Err(ShiftError::OutOfRange {
            field: "num_workers",
            limit: MAX_WORKERS,
        });
    }

    let start = start_date(request)?;
    let thin = Borders::all(BorderStyle::Thin);
    let header = CellStyle::new()
        .with_fill(HEADER_FILL)
        .centered()
        .with_borders(thin);
    let body = CellStyle::new().centered().with_borders(thin);

    let mut sheet = Worksheet::new("シフト表");
    sheet.set(1, 1, "名前", CellStyle::new().with_fill(HEADER_FILL));

    for day in 0..request.num_days {
        let col = day + 2;
        let date = start
            .checked_add_days(Days::new(u64::from(day)))
            .ok_or_else(|| ShiftError::InvalidDate(start.to_string()))?;
        sheet.set(1, col, date.format("%m/%d (%a)").to_string(), header.clone());
        sheet.set_col_width(col, 12.0);
    }

    for worker in 0..request.num_workers {
        let row = worker + 2;
        sheet.set(row, 1, format!("スタッフ{}", worker + 1), header.clone());
        for day in 0..request.num_days {
            sheet.set(row, day + 2, "", body.clone());
        }
    }

    Ok(sheet)
}

/// Workbook bytes and the download name `shift_{YYYYMMDD}.xlsx`.
pub fn export(request: &CalendarRequest) -> Result<(Vec<u8>, String), ShiftError> {
    let mut workbook = Workbook::new();
    workbook.add_sheet(build_sheet(request)?);
    let filename = format!("shift_{}.xlsx", Local::now().format("%Y%m%d"));
    Ok((workbook.to_bytes()?, filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(start: Option<&str>, days: u32, workers: u32) -> CalendarRequest {
        CalendarRequest {
            start_date: start.map(str::to_string),
            num_days: days,
            num_workers: workers,
        }
    }

    #[test]
    fn test_headers_and_rows() {
        let sheet = build_sheet(&request(Some("2024-04-01"), 3, 2)).unwrap();
        assert_eq!(sheet.value(1, 1), Some("名前"));
        assert_eq!(sheet.value(1, 2), Some("04/01 (Mon)"));
        assert_eq!(sheet.value(1, 4), Some("04/03 (Wed)"));
        assert_eq!(sheet.value(2, 1), Some("スタッフ1"));
        assert_eq!(sheet.value(3, 1), Some("スタッフ2"));
        assert_eq!(sheet.value(3, 4), Some(""));
        assert_eq!(sheet.style(3, 4).unwrap().borders.left, BorderStyle::Thin);
        assert_eq!(sheet.col_width(2), Some(12.0));
    }

    #[test]
    fn test_defaults_from_json() {
        let request: CalendarRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.num_days, 7);
        assert_eq!(request.num_workers, 10);
        assert!(start_date(&request).is_ok());
    }

    #[test]
    fn test_invalid_date() {
        assert!(matches!(
            build_sheet(&request(Some("04/01/2024"), 1, 1)),
            Err(ShiftError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_dates_past_the_calendar_end() {
        assert!(matches!(
            build_sheet(&request(Some("+262142-12-31"), 2, 1)),
            Err(ShiftError::InvalidDate(_))
        ));
        assert!(build_sheet(&request(Some("+262142-12-31"), 1, 1)).is_ok());
    }

    #[test]
    fn test_size_limits() {
        assert!(matches!(
            build_sheet(&request(Some("2024-04-01"), MAX_DAYS + 1, 1)),
            Err(ShiftError::OutOfRange { field: "num_days", .. })
        ));
        assert!(matches!(
            build_sheet(&request(Some("2024-04-01"), 7, 4_000_000_000)),
            Err(ShiftError::OutOfRange { field: "num_workers", .. })
        ));
        assert!(build_sheet(&request(Some("2024-04-01"), MAX_DAYS, 1)).is_ok());
    }

    #[test]
    fn test_export_filename() {
        let (bytes, name) = export(&request(None, 1, 1)).unwrap();
        assert!(!bytes.is_empty());
        assert!(name.starts_with("shift_") && name.ends_with(".xlsx"));
        assert_eq!(name.len(), "shift_20240101.xlsx".len());
    }
}
