//! In-process store backed by a JSON snapshot on disk.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;
use tracing::{debug, info};

use super::AllocationStore;
use crate::error::{ModelError, StoreError};
use crate::model::{
    Assignment, AssignmentLedger, AttendanceCalendar, AttendanceStatus, DayAssignments,
    Exclusion, ParkingInventory, ParkingSpace, SpaceId, SpaceType, UserId, UserProfile,
};
use crate::schedule::eligibility::check_selectable;
use crate::settings::{AllocationSettings, SettingsPatch, ValidatedSettings};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRecord {
    profile: UserProfile,
    #[serde(default)]
    attendance: AttendanceCalendar,
    #[serde(default)]
    exclusions: Vec<Exclusion>,
}

impl UserRecord {
    fn new(profile: UserProfile) -> Self {
        Self {
            profile,
            attendance: AttendanceCalendar::new(),
            exclusions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CommittedDay {
    revision: u64,
    assignments: DayAssignments,
}

/// Dashboard counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub users: usize,
    pub active_users: usize,
    pub spaces: usize,
    pub reserved_spaces: usize,
    pub spaces_by_type: BTreeMap<SpaceType, usize>,
    pub attending_today: usize,
    pub assigned_today: usize,
    pub upcoming_assignments: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStore {
    settings: AllocationSettings,
    inventory: ParkingInventory,
    users: BTreeMap<UserId, UserRecord>,
    assignments: BTreeMap<NaiveDate, CommittedDay>,
    next_exclusion_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a snapshot; a missing file yields an empty store with default settings.
    pub fn load_snapshot(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            info!(path = %path.display(), "no snapshot found, starting empty");
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path)?;
        let store: Self = serde_json::from_str(&content)?;
        info!(
            path = %path.display(),
            users = store.users.len(),
            spaces = store.inventory.len(),
            "snapshot loaded"
        );
        Ok(store)
    }

    /// Writes the snapshot through a temp file so a crash never leaves a truncated file.
    pub fn save_snapshot(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), "snapshot saved");
        Ok(())
    }

    // Settings

    pub fn settings(&self) -> &AllocationSettings {
        &self.settings
    }

    /// Applies a patch only if the resulting settings validate as a whole.
    pub fn update_settings(&mut self, patch: &SettingsPatch) -> Result<ValidatedSettings, StoreError> {
        let validated = self.settings.patched(patch).validate()?;
        self.settings = validated.clone().into_inner();
        info!("allocation settings updated");
        Ok(validated)
    }

    pub fn reset_settings(&mut self) -> &AllocationSettings {
        self.settings = AllocationSettings::default();
        info!("allocation settings reset to defaults");
        &self.settings
    }

    #[cfg(test)]
    pub(crate) fn replace_settings_unchecked(&mut self, settings: AllocationSettings) {
        self.settings = settings;
    }

    // Inventory

    pub fn inventory(&self) -> &ParkingInventory {
        &self.inventory
    }

    pub fn add_space(&mut self, space: ParkingSpace) -> Result<(), StoreError> {
        debug!(space = %space.id, "adding parking space");
        self.inventory.add(space)?;
        Ok(())
    }

    pub fn update_space(&mut self, space: ParkingSpace) -> Result<ParkingSpace, StoreError> {
        Ok(self.inventory.update(space)?)
    }

    pub fn remove_space(&mut self, id: &SpaceId) -> Result<ParkingSpace, StoreError> {
        Ok(self.inventory.remove(id)?)
    }

    // Users

    pub fn user(&self, id: &UserId) -> Option<&UserProfile> {
        self.users.get(id).map(|r| &r.profile)
    }

    /// Inserts or replaces a profile, keeping the user's attendance and exclusions.
    pub fn upsert_user(&mut self, profile: UserProfile) -> Result<Option<UserProfile>, StoreError> {
        if profile.id.as_str().trim().is_empty() {
            return Err(ModelError::EmptyId.into());
        }
        match self.users.get_mut(&profile.id) {
            Some(record) => Ok(Some(std::mem::replace(&mut record.profile, profile))),
            None => {
                self.users
                    .insert(profile.id.clone(), UserRecord::new(profile));
                Ok(None)
            }
        }
    }

    pub fn remove_user(&mut self, id: &UserId) -> Result<UserProfile, StoreError> {
        self.users
            .remove(id)
            .map(|r| r.profile)
            .ok_or_else(|| ModelError::UnknownUser(id.clone()).into())
    }

    // Attendance

    /// User-facing selection: only today through three months ahead can be changed.
    pub fn mark_attendance(
        &mut self,
        user: &UserId,
        date: NaiveDate,
        status: AttendanceStatus,
        today: NaiveDate,
    ) -> Result<Option<AttendanceStatus>, StoreError> {
        check_selectable(today, date)?;
        self.record_attendance(user, date, status)
    }

    /// Records attendance without the selection policy. Unknown users get a default profile.
    pub fn record_attendance(
        &mut self,
        user: &UserId,
        date: NaiveDate,
        status: AttendanceStatus,
    ) -> Result<Option<AttendanceStatus>, StoreError> {
        if user.as_str().trim().is_empty() {
            return Err(ModelError::EmptyId.into());
        }
        let record = self
            .users
            .entry(user.clone())
            .or_insert_with(|| UserRecord::new(UserProfile::new(user.as_str())));
        Ok(record.attendance.mark(date, status))
    }

    pub fn remove_attendance(
        &mut self,
        user: &UserId,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<Option<AttendanceStatus>, StoreError> {
        check_selectable(today, date)?;
        let record = self.record_mut(user)?;
        Ok(record.attendance.remove(date))
    }

    // Exclusions

    pub fn add_exclusion(
        &mut self,
        user: &UserId,
        start: NaiveDate,
        end: Option<NaiveDate>,
        reason: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Exclusion, StoreError> {
        let id = self.next_exclusion_id + 1;
        let exclusion = Exclusion::new(id, start, end, reason, created_at)?;
        self.record_mut(user)?.exclusions.push(exclusion.clone());
        self.next_exclusion_id = id;
        info!(%user, id, %start, "exclusion added");
        Ok(exclusion)
    }

    pub fn remove_exclusion(&mut self, user: &UserId, id: u64) -> Result<Exclusion, StoreError> {
        let record = self.record_mut(user)?;
        let pos = record
            .exclusions
            .iter()
            .position(|e| e.id() == id)
            .ok_or(ModelError::UnknownExclusion(id))?;
        Ok(record.exclusions.remove(pos))
    }

    // Assignments

    pub fn assignments_on(&self, date: NaiveDate) -> Option<&DayAssignments> {
        self.assignments.get(&date).map(|d| &d.assignments)
    }

    pub fn upcoming_assignments(&self, user: &UserId, today: NaiveDate) -> Vec<Assignment> {
        let mut ledger = AssignmentLedger::new();
        for (date, day) in self.assignments.range(today..) {
            if day.assignments.contains_user(user) {
                ledger.record(*date, day.assignments.clone());
            }
        }
        ledger.upcoming_for(user, today)
    }

    pub fn stats(&self, today: NaiveDate) -> StoreStats {
        let attending_today = self
            .users
            .values()
            .filter(|r| r.profile.active && r.attendance.status_on(today).is_some())
            .count();
        StoreStats {
            users: self.users.len(),
            active_users: self.users.values().filter(|r| r.profile.active).count(),
            spaces: self.inventory.len(),
            reserved_spaces: self.inventory.reserved_count(),
            spaces_by_type: self.inventory.count_by_type(),
            attending_today,
            assigned_today: self.assignments_on(today).map_or(0, DayAssignments::len),
            upcoming_assignments: self
                .assignments
                .range(today..)
                .map(|(_, d)| d.assignments.len())
                .sum(),
        }
    }

    fn record_mut(&mut self, user: &UserId) -> Result<&mut UserRecord, ModelError> {
        self.users
            .get_mut(user)
            .ok_or_else(|| ModelError::UnknownUser(user.clone()))
    }
}

impl AllocationStore for MemoryStore {
    fn list_users(&self) -> Result<Vec<UserProfile>, StoreError> {
        Ok(self.users.values().map(|r| r.profile.clone()).collect())
    }

    fn load_attendance(
        &self,
        user: &UserId,
        range: RangeInclusive<NaiveDate>,
    ) -> Result<AttendanceCalendar, StoreError> {
        Ok(self
            .users
            .get(user)
            .map(|r| r.attendance.within(range))
            .unwrap_or_default())
    }

    fn load_exclusions(&self, user: &UserId) -> Result<Vec<Exclusion>, StoreError> {
        Ok(self
            .users
            .get(user)
            .map(|r| r.exclusions.clone())
            .unwrap_or_default())
    }

    fn load_inventory(&self) -> Result<ParkingInventory, StoreError> {
        Ok(self.inventory.clone())
    }

    fn load_settings(&self) -> Result<AllocationSettings, StoreError> {
        Ok(self.settings.clone())
    }

    fn load_assignments(
        &self,
        range: RangeInclusive<NaiveDate>,
    ) -> Result<AssignmentLedger, StoreError> {
        let mut ledger = AssignmentLedger::new();
        if range.start() > range.end() {
            return Ok(ledger);
        }
        for (date, day) in self.assignments.range(range) {
            ledger.record(*date, day.assignments.clone());
        }
        Ok(ledger)
    }

    fn day_revision(&self, date: NaiveDate) -> Result<u64, StoreError> {
        Ok(self.assignments.get(&date).map_or(0, |d| d.revision))
    }

    fn commit_assignments(
        &mut self,
        date: NaiveDate,
        assignments: &DayAssignments,
        expected_revision: u64,
    ) -> Result<u64, StoreError> {
        let found = self.day_revision(date)?;
        if found != expected_revision {
            return Err(StoreError::CommitConflict {
                date,
                expected: expected_revision,
                found,
            });
        }
        let revision = found + 1;
        self.assignments.insert(
            date,
            CommittedDay {
                revision,
                assignments: assignments.clone(),
            },
        );
        Ok(revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
    }

    fn user(id: &str) -> UserId {
        UserId::new(id)
    }

    #[test]
    fn test_settings_patch_rejected_as_whole() {
        let mut store = MemoryStore::new();
        let patch = SettingsPatch {
            fairness_weight: Some(50),
            reserved_spaces: Some(99),
            ..SettingsPatch::default()
        };
        assert!(matches!(
            store.update_settings(&patch),
            Err(StoreError::Settings(_))
        ));
        assert_eq!(store.settings(), &AllocationSettings::default());

        let ok = SettingsPatch {
            fairness_weight: Some(50),
            ..SettingsPatch::default()
        };
        assert_eq!(store.update_settings(&ok).unwrap().fairness_weight, 50);
        store.reset_settings();
        assert_eq!(store.settings().fairness_weight, 70);
    }

    #[test]
    fn test_mark_attendance_policy() {
        let mut store = MemoryStore::new();
        let today = day(10, 15);
        assert!(store
            .mark_attendance(&user("u1"), day(10, 14), AttendanceStatus::Confirmed, today)
            .is_err());
        assert!(store
            .mark_attendance(&user("u1"), NaiveDate::from_ymd_opt(2027, 1, 16).unwrap(), AttendanceStatus::Confirmed, today)
            .is_err());
        assert_eq!(
            store
                .mark_attendance(&user("u1"), day(10, 20), AttendanceStatus::Tentative, today)
                .unwrap(),
            None
        );
        assert_eq!(
            store
                .mark_attendance(&user("u1"), day(10, 20), AttendanceStatus::Confirmed, today)
                .unwrap(),
            Some(AttendanceStatus::Tentative)
        );
        assert!(store.user(&user("u1")).is_some());
        assert_eq!(
            store.remove_attendance(&user("u1"), day(10, 20), today).unwrap(),
            Some(AttendanceStatus::Confirmed)
        );
    }

    #[test]
    fn test_upsert_keeps_attendance() {
        let mut store = MemoryStore::new();
        store
            .record_attendance(&user("u1"), day(10, 20), AttendanceStatus::Confirmed)
            .unwrap();
        let previous = store
            .upsert_user(UserProfile::new("u1").requiring(SpaceType::Electric))
            .unwrap();
        assert!(previous.is_some());
        let calendar = store
            .load_attendance(&user("u1"), day(10, 1)..=day(10, 31))
            .unwrap();
        assert_eq!(calendar.len(), 1);
        assert!(matches!(
            store.upsert_user(UserProfile::new(" ")),
            Err(StoreError::Model(ModelError::EmptyId))
        ));
    }

    #[test]
    fn test_exclusion_ids_and_removal() {
        let mut store = MemoryStore::new();
        store.upsert_user(UserProfile::new("u1")).unwrap();
        let first = store
            .add_exclusion(&user("u1"), day(10, 1), None, Some("leave".into()), Utc::now())
            .unwrap();
        let second = store
            .add_exclusion(&user("u1"), day(11, 1), Some(day(11, 5)), None, Utc::now())
            .unwrap();
        assert_eq!((first.id(), second.id()), (1, 2));
        assert!(store
            .add_exclusion(&user("u1"), day(11, 5), Some(day(11, 1)), None, Utc::now())
            .is_err());
        assert!(store
            .add_exclusion(&user("ghost"), day(11, 1), None, None, Utc::now())
            .is_err());

        store.remove_exclusion(&user("u1"), 1).unwrap();
        assert_eq!(store.load_exclusions(&user("u1")).unwrap(), vec![second]);
        assert!(matches!(
            store.remove_exclusion(&user("u1"), 1),
            Err(StoreError::Model(ModelError::UnknownExclusion(1)))
        ));
    }

    #[test]
    fn test_commit_revision_guard() {
        let mut store = MemoryStore::new();
        let date = day(10, 20);
        let mut assignments = DayAssignments::new();
        assignments.assign(user("u1"), SpaceId::new("A01"));

        assert_eq!(store.day_revision(date).unwrap(), 0);
        assert_eq!(store.commit_assignments(date, &assignments, 0).unwrap(), 1);
        assert!(matches!(
            store.commit_assignments(date, &DayAssignments::new(), 0),
            Err(StoreError::CommitConflict { expected: 0, found: 1, .. })
        ));
        assert_eq!(store.assignments_on(date), Some(&assignments));
        assert_eq!(store.commit_assignments(date, &DayAssignments::new(), 1).unwrap(), 2);
        assert!(store.assignments_on(date).unwrap().is_empty());
    }

    #[test]
    fn test_upcoming_and_stats() {
        let mut store = MemoryStore::new();
        store
            .add_space(ParkingSpace::new("A01", "Level 1", SpaceType::Standard))
            .unwrap();
        store
            .add_space(
                ParkingSpace::new("R01", "Level 1", SpaceType::Electric)
                    .reserved_for(Some(user("boss"))),
            )
            .unwrap();
        store
            .record_attendance(&user("u1"), day(10, 15), AttendanceStatus::Confirmed)
            .unwrap();
        for (d, rev) in [(14, 0), (15, 0), (16, 0)] {
            let mut a = DayAssignments::new();
            a.assign(user("u1"), SpaceId::new("A01"));
            store.commit_assignments(day(10, d), &a, rev).unwrap();
        }

        let upcoming = store.upcoming_assignments(&user("u1"), day(10, 15));
        assert_eq!(upcoming.len(), 2);
        assert_eq!(upcoming[0].date, day(10, 15));

        let stats = store.stats(day(10, 15));
        assert_eq!(stats.users, 1);
        assert_eq!(stats.spaces, 2);
        assert_eq!(stats.reserved_spaces, 1);
        assert_eq!(stats.attending_today, 1);
        assert_eq!(stats.assigned_today, 1);
        assert_eq!(stats.upcoming_assignments, 2);
        assert_eq!(stats.spaces_by_type.get(&SpaceType::Electric), Some(&1));
    }

    #[test]
    fn test_load_assignments_range() {
        let mut store = MemoryStore::new();
        for d in [10, 12, 14] {
            store
                .commit_assignments(day(10, d), &DayAssignments::new(), 0)
                .unwrap();
        }
        let ledger = store.load_assignments(day(10, 11)..=day(10, 14)).unwrap();
        assert_eq!(ledger.iter().count(), 2);
        #[allow(clippy::reversed_empty_ranges)]
        let empty = store.load_assignments(day(10, 14)..=day(10, 11)).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_snapshot_roundtrip_and_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("store.json");
        assert_eq!(MemoryStore::load_snapshot(&path).unwrap().users.len(), 0);

        let mut store = MemoryStore::new();
        store.upsert_user(UserProfile::new("u1")).unwrap();
        store
            .record_attendance(&user("u1"), day(10, 20), AttendanceStatus::Tentative)
            .unwrap();
        store
            .add_exclusion(&user("u1"), day(12, 1), None, None, Utc::now())
            .unwrap();
        store
            .add_space(ParkingSpace::new("A01", "Level 1", SpaceType::Compact))
            .unwrap();
        let mut a = DayAssignments::new();
        a.assign(user("u1"), SpaceId::new("A01"));
        store.commit_assignments(day(10, 20), &a, 0).unwrap();
        store.save_snapshot(&path).unwrap();

        let loaded = MemoryStore::load_snapshot(&path).unwrap();
        assert_eq!(loaded.day_revision(day(10, 20)).unwrap(), 1);
        assert_eq!(loaded.assignments_on(day(10, 20)), Some(&a));
        assert_eq!(loaded.inventory().len(), 1);
        assert_eq!(loaded.load_exclusions(&user("u1")).unwrap().len(), 1);
        // ids continue after a reload
        let mut loaded = loaded;
        let next = loaded
            .add_exclusion(&user("u1"), day(12, 5), None, None, Utc::now())
            .unwrap();
        assert_eq!(next.id(), 2);
    }
}
