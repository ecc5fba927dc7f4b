use chrono::NaiveDate;
use csv::{Reader, StringRecord};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ImportError;
use crate::model::{AttendanceStatus, ParkingSpace, SpaceId, SpaceType, UserId};

/// One attendance row from an import file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRow {
    pub user_id: UserId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

/// Parses a boolean value from various string representations
fn parse_bool(value: &str) -> bool {
    let lower = value.trim().to_lowercase();
    lower == "yes" || lower == "true" || lower == "1" || lower == "y"
}

/// Finds a column by header name, ignoring case and surrounding whitespace
fn column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
}

fn field<'r>(record: &'r StringRecord, col: Option<usize>) -> &'r str {
    col.and_then(|c| record.get(c)).unwrap_or("").trim()
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}

/// Reads parking spaces from CSV with columns
/// `id, name, location, type, reserved, assigned_to`.
///
/// Only `id` is required. A blank name falls back to the id and a blank type means standard.
/// `assigned_to` names the owner of a reserved space.
pub fn read_spaces<R: Read>(input: R) -> Result<Vec<ParkingSpace>, ImportError> {
    let mut reader = Reader::from_reader(input);
    let headers = reader.headers()?.clone();

    let id_col = column(&headers, &["id", "space", "space_id"]).ok_or(ImportError::MissingColumn("id"))?;
    let name_col = column(&headers, &["name"]);
    let location_col = column(&headers, &["location", "level"]);
    let type_col = column(&headers, &["type", "space_type"]);
    let reserved_col = column(&headers, &["reserved"]);
    let owner_col = column(&headers, &["assigned_to", "owner"]);

    let mut spaces = Vec::new();
    for result in reader.records() {
        let record = result?;
        let id = field(&record, Some(id_col));

        // Blank lines in spreadsheet exports
        if id.is_empty() {
            continue;
        }

        let space_type: SpaceType = field(&record, type_col)
            .parse()
            .map_err(|message| ImportError::Row {
                line: line_of(&record),
                message,
            })?;
        let name = field(&record, name_col);
        let owner = field(&record, owner_col);

        spaces.push(ParkingSpace {
            id: SpaceId::new(id),
            name: if name.is_empty() { id.to_string() } else { name.to_string() },
            location: field(&record, location_col).to_string(),
            space_type,
            reserved: parse_bool(field(&record, reserved_col)),
            owner: (!owner.is_empty()).then(|| UserId::new(owner)),
        });
    }

    Ok(spaces)
}

pub fn load_spaces<P: AsRef<Path>>(csv_path: P) -> Result<Vec<ParkingSpace>, ImportError> {
    read_spaces(std::fs::File::open(csv_path).map_err(csv::Error::from)?)
}

/// Reads attendance rows from CSV with columns `user_id, date, status`.
///
/// Dates are `YYYY-MM-DD`. When the same user and date appear more than once the later row
/// wins. Rows come back sorted by date, then user.
pub fn read_attendance<R: Read>(input: R) -> Result<Vec<AttendanceRow>, ImportError> {
    let mut reader = Reader::from_reader(input);
    let headers = reader.headers()?.clone();

    let user_col = column(&headers, &["user_id", "user", "email"]).ok_or(ImportError::MissingColumn("user_id"))?;
    let date_col = column(&headers, &["date"]).ok_or(ImportError::MissingColumn("date"))?;
    let status_col = column(&headers, &["status"]);

    // Resubmissions replace the earlier answer for the same day
    let mut latest: HashMap<(UserId, NaiveDate), AttendanceStatus> = HashMap::new();

    for result in reader.records() {
        let record = result?;
        let user = field(&record, Some(user_col));
        if user.is_empty() {
            continue;
        }

        let line = line_of(&record);
        let date = NaiveDate::parse_from_str(field(&record, Some(date_col)), "%Y-%m-%d").map_err(|e| {
            ImportError::Row {
                line,
                message: format!("invalid date: {e}"),
            }
        })?;

        // A missing status column means every row is a confirmed day
        let status = match field(&record, status_col) {
            "" => AttendanceStatus::Confirmed,
            raw => raw
                .parse()
                .map_err(|message| ImportError::Row { line, message })?,
        };

        latest.insert((UserId::new(user), date), status);
    }

    let mut rows: Vec<AttendanceRow> = latest
        .into_iter()
        .map(|((user_id, date), status)| AttendanceRow { user_id, date, status })
        .collect();
    rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.user_id.cmp(&b.user_id)));
    Ok(rows)
}

pub fn load_attendance<P: AsRef<Path>>(csv_path: P) -> Result<Vec<AttendanceRow>, ImportError> {
    read_attendance(std::fs::File::open(csv_path).map_err(csv::Error::from)?)
}
