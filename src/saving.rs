use crate::config::Team;
use crate::error::SheetError;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;

/// Duration choices offered on the entry form, in display order.
pub const DURATION_LABELS: [(&str, f64); 24] = [
    ("15min", 0.25),
    ("30min", 0.5),
    ("45min", 0.75),
    ("1h", 1.0),
    ("1h 15min", 1.25),
    ("1h 30min", 1.5),
    ("1h 45min", 1.75),
    ("2h", 2.0),
    ("2h 15min", 2.25),
    ("2h 30min", 2.5),
    ("2h 45min", 2.75),
    ("3h", 3.0),
    ("3h 15min", 3.25),
    ("3h 30min", 3.5),
    ("3h 45min", 3.75),
    ("4h", 4.0),
    ("4h 15min", 4.25),
    ("4h 30min", 4.5),
    ("4h 45min", 4.75),
    ("5h", 5.0),
    ("5h 15min", 5.25),
    ("5h 30min", 5.5),
    ("5h 45min", 5.75),
    ("6h", 6.0),
];

lazy_static! {
    static ref TIME_MAP: HashMap<&'static str, f64> = DURATION_LABELS.iter().copied().collect();
}

pub const SAVED_MESSAGE: &str = "The entry was successfully saved!";

/// Hours for a duration label. Unknown labels count as zero.
pub fn duration_hours(label: &str) -> f64 {
    TIME_MAP.get(label).copied().unwrap_or(0.0)
}

/// Body of `POST /submit-entry`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubmitEntryRequest {
    pub name: String,
    pub task: String,
    /// One of [`DURATION_LABELS`].
    pub duration: String,
    pub date: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SubmitEntryResponse {
    pub message: String,
}

impl SubmitEntryRequest {
    /// The stats row to append: name, task, hours, date, notes.
    pub fn to_row(&self) -> Vec<Value> {
        vec![
            json!(self.name),
            json!(self.task),
            json!(duration_hours(&self.duration)),
            json!(self.date),
            json!(self.notes),
        ]
    }
}

/// Appends one entry to the team's stats range.
pub async fn save_entry(team: &Team, request: &SubmitEntryRequest) -> Result<(), SheetError> {
    team.sheet
        .append_row(
            &team.config.spreadsheet_id,
            &team.config.stats_range,
            request.to_row(),
        )
        .await
}
