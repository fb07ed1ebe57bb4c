//! Break rotation over a working day.
//!
//! The day is walked in 15-minute slots. Inside the break window, staff go
//! on break in a rotating block so that everyone not needed for a required
//! position rests, and the remaining staff are dealt onto positions in
//! rotation order.

use serde::{Deserialize, Serialize};

use crate::error::ShiftError;

/// Slot length in minutes.
pub const SLOT_MINUTES: u32 = 15;

/// Largest staff count a table is generated for.
pub const MAX_STAFF: usize = 500;

pub const BREAK_LABEL: &str = "休憩";
pub const IDLE_LABEL: &str = "待機";

/// A break length that replaces the base duration for one break number.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExceptionalBreak {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub duration: u32,
    /// 1-based break number this applies to.
    #[serde(default)]
    pub week: u32,
}

/// Input of the shift generator.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShiftRequest {
    pub staff_count: usize,
    #[serde(default)]
    pub position_names: Vec<String>,
    #[serde(default)]
    pub extra_positions: Vec<String>,
    pub work_start: String,
    pub work_end: String,
    pub break_start: String,
    pub break_end: String,
    /// Base break length in minutes.
    pub break_duration: u32,
    #[serde(default)]
    pub exceptional_breaks: Vec<ExceptionalBreak>,
}

/// One time slot of the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShiftRow {
    pub time: String,
    pub staff: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShiftTable {
    pub staff_count: usize,
    /// Column headers: circled staff numbers.
    pub headers: Vec<String>,
    pub rows: Vec<ShiftRow>,
}

/// Circled number for 1..=50, plain digits otherwise.
pub fn circled_number(n: usize) -> String {
    match n {
        1..=20 => char::from_u32(0x2460 + n as u32 - 1),
        21..=35 => char::from_u32(0x3251 + n as u32 - 21),
        36..=50 => char::from_u32(0x32B1 + n as u32 - 36),
        _ => None,
    }
    .map(String::from)
    .unwrap_or_else(|| n.to_string())
}

/// Minutes since midnight for `HH:MM`.
pub fn parse_time(value: &str) -> Result<u32, ShiftError> {
    let invalid = || ShiftError::InvalidTime(value.to_string());
    let (h, m) = value.trim().split_once(':').ok_or_else(invalid)?;
    let hours: u32 = h.parse().map_err(|_| invalid())?;
    let minutes: u32 = m.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 || m.len() != 2 {
        return Err(invalid());
    }
    Ok(hours * 60 + minutes)
}

pub fn format_time(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60 % 24, minutes % 60)
}

/// Per-staff break state while walking the day.
struct Rotation<'a> {
    staff: usize,
    offset: usize,
    /// Minute each staff member's current break ends.
    break_until: Vec<Option<u32>>,
    breaks_taken: Vec<u32>,
    base_duration: u32,
    exceptional: &'a [ExceptionalBreak],
}

impl<'a> Rotation<'a> {
    fn new(staff: usize, base_duration: u32, exceptional: &'a [ExceptionalBreak]) -> Self {
        Self {
            staff,
            offset: 0,
            break_until: vec![None; staff],
            breaks_taken: vec![0; staff],
            base_duration,
            exceptional,
        }
    }

    fn release_finished(&mut self, now: u32) {
        for until in self.break_until.iter_mut() {
            if until.is_some_and(|end| now >= end) {
                *until = None;
            }
        }
    }

    fn on_break(&self) -> usize {
        self.break_until.iter().filter(|b| b.is_some()).count()
    }

    /// Staff indices of the next break block, wrapping below zero.
    fn candidates(&self, slots: usize) -> Vec<usize> {
        let n = self.staff as i64;
        let start = n - self.offset as i64 - slots as i64;
        let end = n - self.offset as i64;

        if start < 0 {
            ((n + start).max(0)..n).chain(0..end.max(0)).map(|i| i as usize).collect()
        } else {
            (start..end.min(n)).map(|i| i as usize).collect()
        }
    }

    fn duration_for(&self, break_number: u32) -> u32 {
        self.exceptional
            .iter()
            .filter(|eb| eb.enabled && eb.duration > 0 && eb.week > 0)
            .find(|eb| eb.week == break_number)
            .map(|eb| eb.duration)
            .unwrap_or(self.base_duration)
    }

    fn send_on_break(&mut self, now: u32, target: usize) {
        let on_break = self.on_break();
        if on_break >= target {
            return;
        }
        let slots = target - on_break;

        for i in self.candidates(slots) {
            if i < self.staff && self.break_until[i].is_none() {
                let duration = self.duration_for(self.breaks_taken[i] + 1);
                self.break_until[i] = Some(now + duration);
                self.breaks_taken[i] += 1;
            }
        }
        self.offset = (self.offset + slots) % self.staff;
    }

    fn assign(&self, required: &[String], extra: &[String]) -> Vec<String> {
        let mut active: Vec<usize> = (0..self.staff)
            .filter(|i| self.break_until[*i].is_none())
            .collect();
        active.sort_by_key(|i| (i + self.staff - self.offset) % self.staff);

        let mut cells = vec![IDLE_LABEL.to_string(); self.staff];
        for (i, cell) in cells.iter_mut().enumerate() {
            if self.break_until[i].is_some() {
                *cell = BREAK_LABEL.to_string();
            }
        }

        for (rank, staff_idx) in active.iter().enumerate() {
            let label = if rank < required.len() {
                required[rank].clone()
            } else if extra.is_empty() {
                IDLE_LABEL.to_string()
            } else {
                extra[(rank - required.len()) % extra.len()].clone()
            };
            cells[*staff_idx] = label;
        }
        cells
    }
}

/// Builds the day's table.
pub fn generate(request: &ShiftRequest) -> Result<ShiftTable, ShiftError> {
    let staff = request.staff_count;
    if staff == 0 {
        return Err(ShiftError::NoStaff);
    }
    if staff > MAX_STAFF {
        return Err(ShiftError::TooManyStaff(MAX_STAFF));
    }

    let required = &request.position_names;
    let extra: Vec<String> = request
        .extra_positions
        .iter()
        .filter(|p| !p.trim().is_empty())
        .cloned()
        .collect();

    if required.len() > staff {
        return Err(ShiftError::TooManyRequiredPositions);
    }
    if required.len() + extra.len() > staff {
        return Err(ShiftError::TooManyPositions);
    }

    let work_start = parse_time(&request.work_start)?;
    let work_end = parse_time(&request.work_end)?;
    let break_start = parse_time(&request.break_start)?;
    let break_end = parse_time(&request.break_end)?;

    if work_end <= work_start {
        return Err(ShiftError::EmptyWorkDay);
    }
    if break_start < work_start || break_end > work_end {
        return Err(ShiftError::BreakOutsideWorkHours);
    }

    let break_target = staff.saturating_sub(required.len());
    let mut rotation = Rotation::new(staff, request.break_duration, &request.exceptional_breaks);
    let mut rows = Vec::new();

    let mut now = work_start;
    while now < work_end {
        rotation.release_finished(now);
        if break_start <= now && now < break_end {
            rotation.send_on_break(now, break_target);
        }

        rows.push(ShiftRow {
            time: format_time(now),
            staff: rotation.assign(required, &extra),
        });
        now += SLOT_MINUTES;
    }

    Ok(ShiftTable {
        staff_count: staff,
        headers: (1..=staff).map(circled_number).collect(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(staff: usize, required: &[&str], extra: &[&str]) -> ShiftRequest {
        ShiftRequest {
            staff_count: staff,
            position_names: required.iter().map(|s| s.to_string()).collect(),
            extra_positions: extra.iter().map(|s| s.to_string()).collect(),
            work_start: "09:00".into(),
            work_end: "12:00".into(),
            break_start: "10:00".into(),
            break_end: "11:00".into(),
            break_duration: 30,
            exceptional_breaks: vec![],
        }
    }

    #[test]
    fn test_circled_numbers() {
        assert_eq!(circled_number(1), "①");
        assert_eq!(circled_number(20), "⑳");
        assert_eq!(circled_number(21), "㉑");
        assert_eq!(circled_number(35), "㉟");
        assert_eq!(circled_number(36), "㊱");
        assert_eq!(circled_number(50), "㊿");
        assert_eq!(circled_number(51), "51");
    }

    #[test]
    fn test_parse_and_format_time() {
        assert_eq!(parse_time("09:15").unwrap(), 555);
        assert_eq!(format_time(555), "09:15");
        assert!(parse_time("25:00").is_err());
        assert!(parse_time("9").is_err());
        assert!(parse_time("09:5").is_err());
    }

    #[test]
    fn test_slots_cover_working_hours() {
        let table = generate(&request(3, &["レジ"], &[])).unwrap();
        assert_eq!(table.rows.len(), 12);
        assert_eq!(table.rows[0].time, "09:00");
        assert_eq!(table.rows[11].time, "11:45");
        assert_eq!(table.headers, vec!["①", "②", "③"]);
    }

    #[test]
    fn test_before_break_window_required_positions_filled_in_order() {
        let table = generate(&request(3, &["レジ", "品出し"], &[])).unwrap();
        assert_eq!(table.rows[0].staff, vec!["レジ", "品出し", "待機"]);
    }

    #[test]
    fn test_break_rotation_keeps_required_positions_covered() {
        let table = generate(&request(3, &["レジ"], &[])).unwrap();

        // 10:00: two staff may rest; the block is the last two indices.
        let row = &table.rows[4];
        assert_eq!(row.time, "10:00");
        assert_eq!(row.staff, vec!["レジ", "休憩", "休憩"]);

        for row in &table.rows {
            let working = row.staff.iter().filter(|s| *s == "レジ").count();
            assert_eq!(working, 1, "required position uncovered at {}", row.time);
        }
    }

    #[test]
    fn test_breaks_end_after_duration() {
        let table = generate(&request(3, &["レジ"], &[])).unwrap();
        // Breaks from 10:00 last 30 minutes, so staff 2 and 3 are back at 10:30
        // and the next block (staff 1 then wrap) starts.
        let row = &table.rows[6];
        assert_eq!(row.time, "10:30");
        assert_eq!(row.staff[0], BREAK_LABEL);
        assert_eq!(
            row.staff.iter().filter(|s| *s == BREAK_LABEL).count(),
            2
        );
    }

    #[test]
    fn test_exceptional_break_duration_applies_to_break_number() {
        let mut req = request(2, &["レジ"], &[]);
        req.break_duration = 15;
        req.exceptional_breaks = vec![ExceptionalBreak {
            enabled: true,
            duration: 45,
            week: 1,
        }];
        let table = generate(&req).unwrap();

        // Staff 2 starts a 45 minute first break at 10:00.
        for idx in 4..7 {
            assert_eq!(table.rows[idx].staff[1], BREAK_LABEL);
        }
        assert_ne!(table.rows[7].staff[1], BREAK_LABEL);
    }

    #[test]
    fn test_extra_positions_cycle_and_blank_extras_ignored() {
        let table = generate(&request(4, &["レジ"], &["清掃", " ", "補充"])).unwrap();
        assert_eq!(table.rows[0].staff, vec!["レジ", "清掃", "補充", "清掃"]);
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(
            generate(&request(0, &[], &[])),
            Err(ShiftError::NoStaff)
        ));
        assert!(matches!(
            generate(&request(MAX_STAFF + 1, &[], &[])),
            Err(ShiftError::TooManyStaff(MAX_STAFF))
        ));
        assert!(matches!(
            generate(&request(usize::MAX, &[], &[])),
            Err(ShiftError::TooManyStaff(_))
        ));
        assert!(matches!(
            generate(&request(1, &["a", "b"], &[])),
            Err(ShiftError::TooManyRequiredPositions)
        ));
        assert!(matches!(
            generate(&request(2, &["a"], &["b", "c"])),
            Err(ShiftError::TooManyPositions)
        ));

        let mut req = request(2, &["a"], &[]);
        req.break_end = "13:00".into();
        assert!(matches!(
            generate(&req),
            Err(ShiftError::BreakOutsideWorkHours)
        ));

        let mut req = request(2, &["a"], &[]);
        req.work_end = "08:00".into();
        assert!(matches!(generate(&req), Err(ShiftError::EmptyWorkDay)));

        let mut req = request(2, &["a"], &[]);
        req.work_start = "nine".into();
        assert!(matches!(generate(&req), Err(ShiftError::InvalidTime(_))));
    }
}
