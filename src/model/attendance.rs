use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::ModelError;

/// Office-attendance intent for a single day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Confirmed,
    Tentative,
}

impl AttendanceStatus {
    /// Weight used by the attendance score: a confirmed day counts double.
    pub fn weight(self) -> u32 {
        match self {
            Self::Confirmed => 2,
            Self::Tentative => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Tentative => "tentative",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "confirmed" | "yes" => Ok(Self::Confirmed),
            "tentative" | "pending" | "maybe" => Ok(Self::Tentative),
            other => Err(format!("unknown attendance status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

/// Confirmed and tentative day counts over some range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceTally {
    pub confirmed: u32,
    pub tentative: u32,
}

impl AttendanceTally {
    pub fn days(&self) -> u32 {
        self.confirmed.saturating_add(self.tentative)
    }

    pub fn weighted(&self) -> u32 {
        self.confirmed
            .saturating_mul(AttendanceStatus::Confirmed.weight())
            .saturating_add(self.tentative.saturating_mul(AttendanceStatus::Tentative.weight()))
    }
}

/// One user's attendance history, at most one record per date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<AttendanceRecord>", into = "Vec<AttendanceRecord>")]
pub struct AttendanceCalendar {
    days: BTreeMap<NaiveDate, AttendanceStatus>,
}

impl AttendanceCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_on(&self, date: NaiveDate) -> Option<AttendanceStatus> {
        self.days.get(&date).copied()
    }

    /// Sets the status for `date`, replacing any earlier record. Returns the replaced status.
    pub fn mark(&mut self, date: NaiveDate, status: AttendanceStatus) -> Option<AttendanceStatus> {
        self.days.insert(date, status)
    }

    pub fn remove(&mut self, date: NaiveDate) -> Option<AttendanceStatus> {
        self.days.remove(&date)
    }

    /// Records in ascending date order.
    pub fn records(&self) -> impl Iterator<Item = AttendanceRecord> + '_ {
        self.days
            .iter()
            .map(|(date, status)| AttendanceRecord { date: *date, status: *status })
    }

    pub fn within(&self, range: RangeInclusive<NaiveDate>) -> Self {
        if range.start() > range.end() {
            return Self::default();
        }
        Self {
            days: self
                .days
                .range(range)
                .map(|(date, status)| (*date, *status))
                .collect(),
        }
    }

    pub fn tally(&self, range: RangeInclusive<NaiveDate>) -> AttendanceTally {
        let mut tally = AttendanceTally::default();
        if range.start() > range.end() {
            return tally;
        }
        for status in self.days.range(range).map(|(_, status)| status) {
            match status {
                AttendanceStatus::Confirmed => tally.confirmed += 1,
                AttendanceStatus::Tentative => tally.tentative += 1,
            }
        }
        tally
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

impl TryFrom<Vec<AttendanceRecord>> for AttendanceCalendar {
    type Error = ModelError;

    fn try_from(records: Vec<AttendanceRecord>) -> Result<Self, Self::Error> {
        let mut days = BTreeMap::new();
        for record in records {
            if days.insert(record.date, record.status).is_some() {
                return Err(ModelError::DuplicateAttendance(record.date));
            }
        }
        Ok(Self { days })
    }
}

impl From<AttendanceCalendar> for Vec<AttendanceRecord> {
    fn from(calendar: AttendanceCalendar) -> Self {
        calendar.records().collect()
    }
}
