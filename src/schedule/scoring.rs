//! Fairness and attendance scoring.

use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::date_utils::{preceding_range, trailing_range};
use super::types::Candidate;
use crate::model::{AssignmentLedger, AttendanceCalendar, AttendanceStatus, AttendanceTally, UserId};
use crate::settings::ValidatedSettings;

pub const DEFAULT_TRAILING_DAYS: u32 = 30;

/// Trailing-window figures for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserHistory {
    /// Assignments held in the window before the allocated date.
    pub assignment_count: u32,
    pub confirmed_days: u32,
    pub tentative_days: u32,
}

impl UserHistory {
    pub fn attendance(&self) -> AttendanceTally {
        AttendanceTally {
            confirmed: self.confirmed_days,
            tentative: self.tentative_days,
        }
    }

    pub fn attended_days(&self) -> u32 {
        self.attendance().days()
    }
}

/// Everything the engine knows about the past for one run.
#[derive(Debug, Clone)]
pub struct AllocationHistory {
    trailing_days: u32,
    users: BTreeMap<UserId, UserHistory>,
    ledger: AssignmentLedger,
}

impl AllocationHistory {
    pub fn new(trailing_days: u32) -> Self {
        Self {
            trailing_days,
            users: BTreeMap::new(),
            ledger: AssignmentLedger::new(),
        }
    }

    /// Derives per-user figures for a run on `date`.
    ///
    /// Attendance is counted over the `trailing_days` ending at `date`; assignments over the
    /// `trailing_days` before it.
    pub fn build<'a>(
        date: NaiveDate,
        trailing_days: u32,
        calendars: impl IntoIterator<Item = (&'a UserId, &'a AttendanceCalendar)>,
        ledger: AssignmentLedger,
    ) -> Self {
        let attendance_window = trailing_range(date, trailing_days);
        let assignment_window = preceding_range(date, trailing_days);
        let users = calendars
            .into_iter()
            .map(|(user, calendar)| {
                let tally = calendar.tally(attendance_window.clone());
                let history = UserHistory {
                    assignment_count: ledger.count_for(user, assignment_window.clone()),
                    confirmed_days: tally.confirmed,
                    tentative_days: tally.tentative,
                };
                (user.clone(), history)
            })
            .collect();
        Self {
            trailing_days,
            users,
            ledger,
        }
    }

    #[must_use]
    pub fn with_user(mut self, user: UserId, history: UserHistory) -> Self {
        self.users.insert(user, history);
        self
    }

    #[must_use]
    pub fn with_ledger(mut self, ledger: AssignmentLedger) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn trailing_days(&self) -> u32 {
        self.trailing_days
    }

    /// Unknown users have an empty history.
    pub fn for_user(&self, user: &UserId) -> UserHistory {
        self.users.get(user).copied().unwrap_or_default()
    }

    pub fn consecutive_run_before(&self, user: &UserId, date: NaiveDate) -> u32 {
        self.ledger.consecutive_run_before(user, date)
    }
}

/// Fewer past assignments score higher: `1 / (1 + count)`.
pub fn fairness_component(assignment_count: u32) -> f64 {
    1.0 / (1.0 + f64::from(assignment_count))
}

/// Share of the trailing window spent in the office, confirmed days counting double.
pub fn attendance_component(history: &UserHistory, trailing_days: u32) -> f64 {
    if trailing_days == 0 {
        return 0.0;
    }
    let weighted = f64::from(history.attendance().weighted());
    let full = f64::from(AttendanceStatus::Confirmed.weight()) * f64::from(trailing_days);
    (weighted / full).min(1.0)
}

pub fn score(history: &UserHistory, settings: &ValidatedSettings, trailing_days: u32) -> f64 {
    settings.fairness_factor() * fairness_component(history.assignment_count)
        + settings.attendance_factor() * attendance_component(history, trailing_days)
}

#[derive(Debug, Clone)]
pub struct ScoredCandidate<'a> {
    pub candidate: &'a Candidate,
    pub score: f64,
}

/// Highest score first; equal scores fall back to ascending user id.
pub fn rank(scored: &mut [ScoredCandidate<'_>]) {
    scored.sort_by(|a, b| match b.score.total_cmp(&a.score) {
        Ordering::Equal => a.candidate.user_id.cmp(&b.candidate.user_id),
        other => other,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttendanceStatus, DayAssignments, SpaceId};
    use crate::settings::AllocationSettings;

    fn weights(fairness_weight: u32, attendance_weight: u32) -> ValidatedSettings {
        AllocationSettings {
            fairness_weight,
            attendance_weight,
            ..AllocationSettings::default()
        }
        .validate()
        .unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[test]
    fn test_fairness_monotonic_in_history() {
        let settings = weights(100, 0);
        let fewer = UserHistory { assignment_count: 1, confirmed_days: 4, ..UserHistory::default() };
        let more = UserHistory { assignment_count: 4, ..fewer };
        assert!(score(&fewer, &settings, 30) >= score(&more, &settings, 30));
        assert!((score(&UserHistory::default(), &settings, 30) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_confirmed_counts_double_tentative() {
        let confirmed = UserHistory { confirmed_days: 3, ..UserHistory::default() };
        let tentative = UserHistory { tentative_days: 6, ..UserHistory::default() };
        let a = attendance_component(&confirmed, 30);
        let b = attendance_component(&tentative, 30);
        assert!((a - b).abs() < 1e-9);
        assert!((a - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_mixed_history_uses_status_weights() {
        let history = UserHistory { confirmed_days: 2, tentative_days: 1, ..UserHistory::default() };
        assert_eq!(history.attended_days(), 3);
        assert_eq!(history.attendance().weighted(), 5);
        assert!((attendance_component(&history, 10) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_attendance_component_bounded() {
        let full = UserHistory { confirmed_days: 40, ..UserHistory::default() };
        assert!((attendance_component(&full, 30) - 1.0).abs() < 1e-9);
        assert!(attendance_component(&full, 0).abs() < 1e-9);
    }

    #[test]
    fn test_rank_breaks_ties_by_user_id() {
        let candidates = [
            Candidate::new("carol", AttendanceStatus::Confirmed),
            Candidate::new("alice", AttendanceStatus::Confirmed),
            Candidate::new("bob", AttendanceStatus::Confirmed),
        ];
        let mut scored = vec![
            ScoredCandidate { candidate: &candidates[0], score: 0.5 },
            ScoredCandidate { candidate: &candidates[1], score: 0.5 },
            ScoredCandidate { candidate: &candidates[2], score: 0.9 },
        ];
        rank(&mut scored);
        let order: Vec<&str> = scored.iter().map(|s| s.candidate.user_id.as_str()).collect();
        assert_eq!(order, vec!["bob", "alice", "carol"]);
    }

    #[test]
    fn test_build_uses_separate_windows() {
        let user = UserId::new("u1");
        let mut calendar = AttendanceCalendar::new();
        calendar.mark(day(20), AttendanceStatus::Confirmed);
        calendar.mark(day(21), AttendanceStatus::Tentative);
        calendar.mark(day(22), AttendanceStatus::Confirmed);

        let mut ledger = AssignmentLedger::new();
        let mut assigned = DayAssignments::new();
        assigned.assign(user.clone(), SpaceId::new("A01"));
        ledger.record(day(20), assigned.clone());
        ledger.record(day(21), assigned.clone());
        // the run's own date is not history
        ledger.record(day(22), assigned);

        let calendars = vec![(&user, &calendar)];
        let history = AllocationHistory::build(day(22), 30, calendars, ledger);
        let stats = history.for_user(&user);
        assert_eq!(stats.assignment_count, 2);
        assert_eq!(stats.confirmed_days, 2);
        assert_eq!(stats.tentative_days, 1);
        assert_eq!(history.consecutive_run_before(&user, day(22)), 2);
        assert_eq!(history.for_user(&UserId::new("nobody")), UserHistory::default());
    }
}
