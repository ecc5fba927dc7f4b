//! Eligibility and exclusion checks consulted before scoring.

use chrono::NaiveDate;
use serde::Serialize;

use super::date_utils::{is_weekend, months_after};
use super::scoring::UserHistory;
use crate::error::ModelError;
use crate::model::Exclusion;
use crate::settings::ValidatedSettings;

/// How far ahead users may mark attendance, independent of the assignment window.
pub const SELECTION_HORIZON_MONTHS: u32 = 3;

/// Why a candidate was dropped before scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Ineligibility {
    Excluded,
    BelowMinAttendance { days: u32, required: u32 },
    ConsecutiveLimit { run: u32, max: u32 },
}

pub fn is_excluded(exclusions: &[Exclusion], date: NaiveDate) -> bool {
    exclusions.iter().any(|e| e.covers(date))
}

/// True when `date` is a weekend day and weekend parking is off.
pub fn weekend_closed(date: NaiveDate, settings: &ValidatedSettings) -> bool {
    !settings.enable_weekend_parking && is_weekend(date)
}

/// Checks the trailing-window attendance and consecutive-day limits for one candidate.
pub fn check_limits(
    history: &UserHistory,
    consecutive_run: u32,
    settings: &ValidatedSettings,
) -> Result<(), Ineligibility> {
    let days = history.attended_days();
    if days < settings.min_attendance_days {
        return Err(Ineligibility::BelowMinAttendance {
            days,
            required: settings.min_attendance_days,
        });
    }
    if consecutive_run >= settings.max_consecutive_days {
        return Err(Ineligibility::ConsecutiveLimit {
            run: consecutive_run,
            max: settings.max_consecutive_days,
        });
    }
    Ok(())
}

/// Calendar selection policy: no past dates, nothing beyond three months out.
pub fn check_selectable(today: NaiveDate, date: NaiveDate) -> Result<(), ModelError> {
    if date < today {
        return Err(ModelError::PastDate(date));
    }
    if date > months_after(today, SELECTION_HORIZON_MONTHS) {
        return Err(ModelError::BeyondHorizon(date));
    }
    Ok(())
}

/// An allocation run may start today or later, never in the past.
pub fn check_window_start(today: NaiveDate, start: NaiveDate) -> Result<(), ModelError> {
    if start < today {
        return Err(ModelError::PastDate(start));
    }
    Ok(())
}
