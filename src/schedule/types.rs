use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::eligibility::Ineligibility;
use crate::model::{AttendanceStatus, DayAssignments, SpaceType, UserId};

/// A user who intends to be in the office on the allocated date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub user_id: UserId,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub required_space: Option<SpaceType>,
}

impl Candidate {
    pub fn new(user_id: impl Into<String>, status: AttendanceStatus) -> Self {
        Self {
            user_id: UserId::new(user_id),
            status,
            required_space: None,
        }
    }

    #[must_use]
    pub fn requiring(mut self, space_type: SpaceType) -> Self {
        self.required_space = Some(space_type);
        self
    }
}

/// A candidate dropped before scoring, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub user_id: UserId,
    #[serde(flatten)]
    pub reason: Ineligibility,
}

/// Result of allocating a single date
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPlan {
    pub date: NaiveDate,
    pub assignments: DayAssignments,
    /// Eligible candidates left without a space, in rank order.
    pub unassigned: Vec<UserId>,
    pub rejected: Vec<Rejection>,
    pub weekend_closed: bool,
}

impl DayPlan {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            assignments: DayAssignments::new(),
            unassigned: Vec::new(),
            rejected: Vec::new(),
            weekend_closed: false,
        }
    }

    pub fn closed(date: NaiveDate) -> Self {
        Self {
            weekend_closed: true,
            ..Self::new(date)
        }
    }
}
