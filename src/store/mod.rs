//! Persistence interface consumed by the allocation run.

pub mod memory;

use chrono::NaiveDate;
use std::ops::RangeInclusive;

use crate::error::StoreError;
use crate::model::{
    AssignmentLedger, AttendanceCalendar, DayAssignments, Exclusion, ParkingInventory, UserId,
    UserProfile,
};
use crate::settings::AllocationSettings;

pub use memory::{MemoryStore, StoreStats};

/// The document store as seen by the allocation run.
///
/// Commits are guarded by a per-date revision: a commit whose `expected_revision` no longer
/// matches fails with [`StoreError::CommitConflict`] and changes nothing.
pub trait AllocationStore {
    fn list_users(&self) -> Result<Vec<UserProfile>, StoreError>;

    fn load_attendance(
        &self,
        user: &UserId,
        range: RangeInclusive<NaiveDate>,
    ) -> Result<AttendanceCalendar, StoreError>;

    fn load_exclusions(&self, user: &UserId) -> Result<Vec<Exclusion>, StoreError>;

    fn load_inventory(&self) -> Result<ParkingInventory, StoreError>;

    fn load_settings(&self) -> Result<AllocationSettings, StoreError>;

    fn load_assignments(
        &self,
        range: RangeInclusive<NaiveDate>,
    ) -> Result<AssignmentLedger, StoreError>;

    /// Revision of the committed assignments for `date`; 0 when nothing was committed yet.
    fn day_revision(&self, date: NaiveDate) -> Result<u64, StoreError>;

    /// Atomically replaces the assignments for `date`, returning the new revision.
    fn commit_assignments(
        &mut self,
        date: NaiveDate,
        assignments: &DayAssignments,
        expected_revision: u64,
    ) -> Result<u64, StoreError>;
}
