use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// stats columns
pub const NAME_COL: usize = 0;
pub const TASK_COL: usize = 1;
pub const TIME_COL: usize = 2;
pub const DATE_COL: usize = 3;
pub const NOTE_COL: usize = 4;

/// Number of columns a stats row must have to be considered.
pub const STATS_WIDTH: usize = 5;

/// Date format used by the stats sheet and the date-range form field.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// One logged session, parsed out of a single stats row.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct TimeEntry {
    pub name: String,
    pub task: String,
    /// Hours spent.
    pub duration: f64,
    /// `DD/MM/YYYY`, kept as written in the sheet.
    pub date: String,
    pub notes: String,
}

impl TimeEntry {
    /// Parses one raw row into an entry.
    ///
    /// Returns `None` when the row is too short or the duration is not a
    /// finite, non-negative number.
    pub fn from_row(row: &[String]) -> Option<Self> {
        if row.len() < STATS_WIDTH {
            return None;
        }

        let duration = parse_duration(&row[TIME_COL])?;

        Some(TimeEntry {
            name: row[NAME_COL].trim().to_string(),
            task: row[TASK_COL].trim().to_string(),
            duration,
            date: row[DATE_COL].trim().to_string(),
            notes: row[NOTE_COL].clone(),
        })
    }

    /// The entry date, if it is a valid `DD/MM/YYYY` date.
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_date(&self.date)
    }
}

fn parse_duration(cell: &str) -> Option<f64> {
    let value: f64 = cell.trim().parse().ok()?;
    if value.is_finite() && value >= 0.0 {
        Some(value)
    } else {
        None
    }
}

/// Parses a `DD/MM/YYYY` date.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

/// Formats a date the way the sheet stores it.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Lazily turns fetched stats rows into entries, skipping the header row and
/// any row that does not parse.
pub fn normalize(rows: &[Vec<String>]) -> impl Iterator<Item = TimeEntry> + '_ {
    normalize_from(rows, 0)
}

/// Same as [`normalize`] with an explicit zero-based header row index.
pub fn normalize_from(
    rows: &[Vec<String>],
    header_index: usize,
) -> impl Iterator<Item = TimeEntry> + '_ {
    rows.iter()
        .enumerate()
        .filter(move |(r, _)| *r != header_index)
        .filter_map(|(_, row)| TimeEntry::from_row(row))
}

/// Trimmed first-column values of every non-header row, used for the
/// player and task pick lists.
pub fn column_values(rows: &[Vec<String>]) -> Vec<String> {
    rows.iter()
        .skip(1)
        .filter_map(|row| row.first())
        .map(|cell| cell.trim().to_string())
        .filter(|cell| !cell.is_empty())
        .collect()
}
