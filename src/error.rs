//! Error types for the parking allocation service.

use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

use crate::model::{SpaceId, UserId};

/// A single allocation setting outside its declared bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsViolation {
    /// A numeric field fell outside `min..=max`.
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
    /// More reserved spaces than spaces in total.
    ReservedExceedsTotal { reserved: u32, total: u32 },
}

impl fmt::Display for SettingsViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "{field} must be between {min} and {max} (got {value})"),
            Self::ReservedExceedsTotal { reserved, total } => write!(
                f,
                "reservedSpaces ({reserved}) must not exceed totalSpaces ({total})"
            ),
        }
    }
}

/// Every violation found in one settings candidate, in field order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsViolations(pub Vec<SettingsViolation>);

impl SettingsViolations {
    pub fn iter(&self) -> impl Iterator<Item = &SettingsViolation> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SettingsViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&messages.join("; "))
    }
}

/// Errors surfaced by the allocation engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("Invalid settings: {0}")]
    InvalidSettings(SettingsViolations),
}

/// Entity invariants broken at construction or mutation time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Attendance for {0} recorded more than once")]
    DuplicateAttendance(NaiveDate),

    #[error("Exclusion ends ({end}) before it starts ({start})")]
    ExclusionRange { start: NaiveDate, end: NaiveDate },

    #[error("Parking space {0} already exists")]
    DuplicateSpace(SpaceId),

    #[error("Parking space {0} assigned more than once on the same day")]
    DoubleBooked(SpaceId),

    #[error("Parking space {0} not found")]
    UnknownSpace(SpaceId),

    #[error("User {0} not found")]
    UnknownUser(UserId),

    #[error("Exclusion {0} not found")]
    UnknownExclusion(u64),

    #[error("Cannot modify attendance for past date {0}")]
    PastDate(NaiveDate),

    #[error("Cannot schedule attendance for {0}: more than 3 months in advance")]
    BeyondHorizon(NaiveDate),

    #[error("Identifier must not be empty")]
    EmptyId,
}

/// Persistence-side errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Assignments for {date} changed since they were read (expected revision {expected}, found {found})")]
    CommitConflict {
        date: NaiveDate,
        expected: u64,
        found: u64,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Settings(#[from] AllocationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// CSV import errors.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("Line {line}: {message}")]
    Row { line: u64, message: String },
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level error for the binary.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocationError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("Export error: {0}")]
    Export(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
