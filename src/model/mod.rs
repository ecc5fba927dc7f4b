//! Typed entities for attendance, inventory, exclusions and assignments.

pub mod assignment;
pub mod attendance;
pub mod exclusion;
pub mod inventory;
pub mod user;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use assignment::{Assignment, AssignmentLedger, DayAssignments};
pub use attendance::{AttendanceCalendar, AttendanceRecord, AttendanceStatus, AttendanceTally};
pub use exclusion::{Exclusion, ExclusionSet};
pub use inventory::{ParkingInventory, ParkingSpace, SpaceType};
pub use user::{UserProfile, UserRole};

/// Identifier of an authenticated user, supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identifier of a parking space, e.g. `A01`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpaceId(String);

impl SpaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpaceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
