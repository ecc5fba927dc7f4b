use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use std::ops::RangeInclusive;

/// `date` minus `n` days, saturating at the earliest representable date.
pub fn days_before(date: NaiveDate, n: u32) -> NaiveDate {
    date.checked_sub_days(Days::new(u64::from(n)))
        .unwrap_or(NaiveDate::MIN)
}

/// `date` plus `n` days, saturating at the latest representable date.
pub fn days_after(date: NaiveDate, n: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(n)))
        .unwrap_or(NaiveDate::MAX)
}

pub fn months_after(date: NaiveDate, n: u32) -> NaiveDate {
    date.checked_add_months(Months::new(n))
        .unwrap_or(NaiveDate::MAX)
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The `days` days ending at and including `date`.
pub fn trailing_range(date: NaiveDate, days: u32) -> RangeInclusive<NaiveDate> {
    days_before(date, days.saturating_sub(1))..=date
}

/// The `days` days strictly before `date`.
pub fn preceding_range(date: NaiveDate, days: u32) -> RangeInclusive<NaiveDate> {
    days_before(date, days)..=days_before(date, 1)
}

/// Every date from `today` through `today + window`, ascending.
pub fn window_dates(today: NaiveDate, window: u32) -> Vec<NaiveDate> {
    let last = days_after(today, window);
    today.iter_days().take_while(|d| *d <= last).collect()
}

/// Formats a date for display, e.g. `2026-10-16 (Fri)`
pub fn format_day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d (%a)").to_string()
}
