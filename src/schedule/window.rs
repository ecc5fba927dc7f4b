//! Sequential allocation over the assignment window.
//!
//! Days are processed in ascending order and each day is committed before the next one is
//! read, so consecutive-day limits see the assignments made earlier in the same run.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::date_utils::{preceding_range, trailing_range, window_dates};
use super::engine::plan_day;
use super::scoring::AllocationHistory;
use super::types::{Candidate, DayPlan};
use crate::error::StoreError;
use crate::model::{AssignmentLedger, AttendanceCalendar, ExclusionSet, ParkingInventory, UserId};
use crate::settings::ValidatedSettings;
use crate::store::AllocationStore;

/// What happened to one date of the window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DayOutcome {
    Committed {
        plan: DayPlan,
        candidates: usize,
        revision: u64,
    },
    Failed {
        date: NaiveDate,
        error: String,
    },
}

impl DayOutcome {
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Committed { plan, .. } => plan.date,
            Self::Failed { date, .. } => *date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowReport {
    pub start: NaiveDate,
    pub days: Vec<DayOutcome>,
}

impl WindowReport {
    pub fn committed_count(&self) -> usize {
        self.days
            .iter()
            .filter(|d| matches!(d, DayOutcome::Committed { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.days.len() - self.committed_count()
    }

    /// Committed plans as a ledger, for display and export.
    pub fn ledger(&self) -> AssignmentLedger {
        let mut ledger = AssignmentLedger::new();
        for day in &self.days {
            if let DayOutcome::Committed { plan, .. } = day {
                ledger.record(plan.date, plan.assignments.clone());
            }
        }
        ledger
    }
}

struct DayInputs {
    candidates: Vec<Candidate>,
    inventory: ParkingInventory,
    exclusions: ExclusionSet,
    history: AllocationHistory,
}

/// Drives [`plan_day`] across the window against a store.
pub struct WindowRunner<'a, S: AllocationStore + ?Sized> {
    store: &'a mut S,
    trailing_days: u32,
    commit_retries: u32,
}

impl<'a, S: AllocationStore + ?Sized> WindowRunner<'a, S> {
    pub fn new(store: &'a mut S, trailing_days: u32, commit_retries: u32) -> Self {
        Self {
            store,
            trailing_days,
            commit_retries,
        }
    }

    /// Allocates every date from `today` through `today + assignmentWindow`.
    ///
    /// Fails only when the settings cannot be loaded or are invalid. A failing date is logged
    /// and reported, and the run moves on to the next one.
    pub fn run(&mut self, today: NaiveDate) -> Result<WindowReport, StoreError> {
        let settings = self.store.load_settings()?.validate()?;
        Ok(self.run_with(today, &settings))
    }

    /// Like [`run`](Self::run), but does nothing when `autoAssign` is off.
    pub fn run_if_auto(&mut self, today: NaiveDate) -> Result<Option<WindowReport>, StoreError> {
        let settings = self.store.load_settings()?.validate()?;
        if !settings.auto_assign {
            debug!("auto-assign disabled, skipping scheduled run");
            return Ok(None);
        }
        Ok(Some(self.run_with(today, &settings)))
    }

    fn run_with(&mut self, today: NaiveDate, settings: &ValidatedSettings) -> WindowReport {
        let dates = window_dates(today, settings.assignment_window);
        info!(start = %today, days = dates.len(), "allocation run started");

        let mut days = Vec::with_capacity(dates.len());
        for date in dates {
            match self.run_day(date, settings) {
                Ok(outcome) => days.push(outcome),
                Err(err) => {
                    warn!(%date, error = %err, "allocation failed for date, continuing");
                    days.push(DayOutcome::Failed {
                        date,
                        error: err.to_string(),
                    });
                }
            }
        }

        let report = WindowReport { start: today, days };
        info!(
            committed = report.committed_count(),
            failed = report.failed_count(),
            "allocation run finished"
        );
        report
    }

    /// Allocates and commits one date, retrying from a fresh read on commit conflicts.
    pub fn run_day(
        &mut self,
        date: NaiveDate,
        settings: &ValidatedSettings,
    ) -> Result<DayOutcome, StoreError> {
        let mut attempt = 0;
        loop {
            let expected = self.store.day_revision(date)?;
            let inputs = self.gather(date)?;
            let plan = plan_day(
                date,
                &inputs.candidates,
                &inputs.inventory,
                &inputs.exclusions,
                settings,
                &inputs.history,
            );

            match self.store.commit_assignments(date, &plan.assignments, expected) {
                Ok(revision) => {
                    info!(
                        %date,
                        candidates = inputs.candidates.len(),
                        assigned = plan.assignments.len(),
                        revision,
                        "assignments committed"
                    );
                    return Ok(DayOutcome::Committed {
                        candidates: inputs.candidates.len(),
                        plan,
                        revision,
                    });
                }
                Err(StoreError::CommitConflict { .. }) if attempt < self.commit_retries => {
                    attempt += 1;
                    warn!(%date, attempt, "commit conflict, reloading");
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn gather(&self, date: NaiveDate) -> Result<DayInputs, StoreError> {
        let attendance_window = trailing_range(date, self.trailing_days);
        let inventory = self.store.load_inventory()?;
        let ledger = self
            .store
            .load_assignments(preceding_range(date, self.trailing_days))?;

        let mut candidates = Vec::new();
        let mut exclusions = ExclusionSet::new();
        let mut calendars: Vec<(UserId, AttendanceCalendar)> = Vec::new();
        for user in self.store.list_users()?.into_iter().filter(|u| u.active) {
            let calendar = self
                .store
                .load_attendance(&user.id, attendance_window.clone())?;
            if let Some(status) = calendar.status_on(date) {
                exclusions.insert(user.id.clone(), self.store.load_exclusions(&user.id)?);
                candidates.push(Candidate {
                    user_id: user.id.clone(),
                    status,
                    required_space: user.required_space,
                });
            }
            calendars.push((user.id, calendar));
        }

        let history = AllocationHistory::build(
            date,
            self.trailing_days,
            calendars.iter().map(|(user, calendar)| (user, calendar)),
            ledger,
        );
        Ok(DayInputs {
            candidates,
            inventory,
            exclusions,
            history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AttendanceStatus, DayAssignments, Exclusion, ParkingSpace, SpaceType, UserProfile,
    };
    use crate::settings::SettingsPatch;
    use crate::store::MemoryStore;
    use chrono::Utc;
    use std::ops::RangeInclusive;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn seeded_store(users: &[&str], spaces: usize, patch: SettingsPatch) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.update_settings(&patch).unwrap();
        for i in 1..=spaces {
            store
                .add_space(ParkingSpace::new(format!("A{i:02}"), "Level 1", SpaceType::Standard))
                .unwrap();
        }
        for user in users {
            store.upsert_user(UserProfile::new(*user)).unwrap();
        }
        store
    }

    #[test]
    fn test_consecutive_limit_sees_earlier_days_of_same_run() {
        let mut store = seeded_store(
            &["alice"],
            1,
            SettingsPatch {
                total_spaces: Some(1),
                reserved_spaces: Some(0),
                max_consecutive_days: Some(2),
                enable_weekend_parking: Some(true),
                assignment_window: Some(3),
                ..SettingsPatch::default()
            },
        );
        let alice = UserId::new("alice");
        for d in 15..=18 {
            store
                .record_attendance(&alice, day(d), AttendanceStatus::Confirmed)
                .unwrap();
        }

        let report = WindowRunner::new(&mut store, 30, 0).run(day(15)).unwrap();

        assert_eq!(report.days.len(), 4);
        assert_eq!(report.committed_count(), 4);
        let held: Vec<bool> = report
            .days
            .iter()
            .map(|d| store.assignments_on(d.date()).is_some_and(|a| a.contains_user(&alice)))
            .collect();
        assert_eq!(held, vec![true, true, false, true]);
    }

    #[test]
    fn test_excluded_and_inactive_users_skipped() {
        let mut store = seeded_store(
            &["alice", "bob", "carol"],
            3,
            SettingsPatch {
                total_spaces: Some(3),
                reserved_spaces: Some(0),
                assignment_window: Some(1),
                ..SettingsPatch::default()
            },
        );
        // 2026-10-15 is a Thursday
        for user in ["alice", "bob", "carol"] {
            store
                .record_attendance(&UserId::new(user), day(15), AttendanceStatus::Tentative)
                .unwrap();
        }
        store
            .add_exclusion(&UserId::new("bob"), day(14), Some(day(16)), None, Utc::now())
            .unwrap();
        let mut carol = UserProfile::new("carol");
        carol.active = false;
        store.upsert_user(carol).unwrap();

        let report = WindowRunner::new(&mut store, 30, 0).run(day(15)).unwrap();
        let DayOutcome::Committed { plan, candidates, .. } = &report.days[0] else {
            panic!("expected a committed day");
        };
        assert_eq!(*candidates, 2);
        assert_eq!(plan.assignments.len(), 1);
        assert!(plan.assignments.contains_user(&UserId::new("alice")));
        assert_eq!(plan.rejected.len(), 1);
    }

    #[test]
    fn test_auto_run_respects_toggle() {
        let mut store = seeded_store(
            &[],
            0,
            SettingsPatch {
                auto_assign: Some(false),
                ..SettingsPatch::default()
            },
        );
        assert!(WindowRunner::new(&mut store, 30, 0)
            .run_if_auto(day(15))
            .unwrap()
            .is_none());
    }

    /// Simulates a concurrent writer touching the date right before each of our commits.
    struct ConflictingStore {
        inner: MemoryStore,
        conflicts_left: u32,
    }

    impl AllocationStore for ConflictingStore {
        fn list_users(&self) -> Result<Vec<UserProfile>, StoreError> {
            self.inner.list_users()
        }

        fn load_attendance(
            &self,
            user: &UserId,
            range: RangeInclusive<NaiveDate>,
        ) -> Result<AttendanceCalendar, StoreError> {
            self.inner.load_attendance(user, range)
        }

        fn load_exclusions(&self, user: &UserId) -> Result<Vec<Exclusion>, StoreError> {
            self.inner.load_exclusions(user)
        }

        fn load_inventory(&self) -> Result<ParkingInventory, StoreError> {
            self.inner.load_inventory()
        }

        fn load_settings(&self) -> Result<crate::settings::AllocationSettings, StoreError> {
            self.inner.load_settings()
        }

        fn load_assignments(
            &self,
            range: RangeInclusive<NaiveDate>,
        ) -> Result<AssignmentLedger, StoreError> {
            self.inner.load_assignments(range)
        }

        fn day_revision(&self, date: NaiveDate) -> Result<u64, StoreError> {
            self.inner.day_revision(date)
        }

        fn commit_assignments(
            &mut self,
            date: NaiveDate,
            assignments: &DayAssignments,
            expected_revision: u64,
        ) -> Result<u64, StoreError> {
            if self.conflicts_left > 0 {
                self.conflicts_left -= 1;
                let current = self.inner.day_revision(date)?;
                self.inner
                    .commit_assignments(date, &DayAssignments::new(), current)?;
            }
            self.inner
                .commit_assignments(date, assignments, expected_revision)
        }
    }

    fn conflicting(conflicts_left: u32) -> ConflictingStore {
        let mut inner = seeded_store(
            &["alice"],
            1,
            SettingsPatch {
                total_spaces: Some(1),
                reserved_spaces: Some(0),
                assignment_window: Some(1),
                ..SettingsPatch::default()
            },
        );
        inner
            .record_attendance(&UserId::new("alice"), day(15), AttendanceStatus::Confirmed)
            .unwrap();
        inner
            .record_attendance(&UserId::new("alice"), day(16), AttendanceStatus::Confirmed)
            .unwrap();
        ConflictingStore {
            inner,
            conflicts_left,
        }
    }

    #[test]
    fn test_conflict_retried_from_fresh_read() {
        let mut store = conflicting(1);
        let report = WindowRunner::new(&mut store, 30, 2).run(day(15)).unwrap();
        assert_eq!(report.committed_count(), 2);
        let assigned = store.inner.assignments_on(day(15)).unwrap();
        assert!(assigned.contains_user(&UserId::new("alice")));
    }

    #[test]
    fn test_failed_day_does_not_block_later_days() {
        let mut store = conflicting(1);
        let report = WindowRunner::new(&mut store, 30, 0).run(day(15)).unwrap();
        assert_eq!(report.failed_count(), 1);
        assert!(matches!(report.days[0], DayOutcome::Failed { .. }));
        assert!(matches!(report.days[1], DayOutcome::Committed { .. }));
        assert_eq!(report.ledger().day(day(16)).map(DayAssignments::len), Some(1));
    }

    #[test]
    fn test_invalid_settings_abort_run() {
        let mut store = MemoryStore::new();
        store.replace_settings_unchecked(crate::settings::AllocationSettings {
            reserved_spaces: 40,
            ..crate::settings::AllocationSettings::default()
        });
        let result = WindowRunner::new(&mut store, 30, 0).run(day(15));
        assert!(matches!(result, Err(StoreError::Settings(_))));
    }
}
