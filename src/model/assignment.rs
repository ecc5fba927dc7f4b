use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

use super::{SpaceId, UserId};
use crate::error::ModelError;
use crate::schedule::date_utils::days_before;

/// A committed parking assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub date: NaiveDate,
    pub user_id: UserId,
    pub space_id: SpaceId,
}

/// Assignments for a single date: each user and each space appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<UserId, SpaceId>", into = "BTreeMap<UserId, SpaceId>")]
pub struct DayAssignments {
    by_user: BTreeMap<UserId, SpaceId>,
    taken: BTreeSet<SpaceId>,
}

impl DayAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `user -> space` unless either is already booked. Returns whether it was recorded.
    pub fn assign(&mut self, user: UserId, space: SpaceId) -> bool {
        if self.by_user.contains_key(&user) || self.taken.contains(&space) {
            return false;
        }
        self.taken.insert(space.clone());
        self.by_user.insert(user, space);
        true
    }

    pub fn space_for(&self, user: &UserId) -> Option<&SpaceId> {
        self.by_user.get(user)
    }

    pub fn contains_user(&self, user: &UserId) -> bool {
        self.by_user.contains_key(user)
    }

    pub fn is_taken(&self, space: &SpaceId) -> bool {
        self.taken.contains(space)
    }

    /// Pairs in ascending user id order.
    pub fn iter(&self) -> impl Iterator<Item = (&UserId, &SpaceId)> {
        self.by_user.iter()
    }

    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }

    pub fn to_assignments(&self, date: NaiveDate) -> Vec<Assignment> {
        self.by_user
            .iter()
            .map(|(user, space)| Assignment {
                date,
                user_id: user.clone(),
                space_id: space.clone(),
            })
            .collect()
    }
}

impl TryFrom<BTreeMap<UserId, SpaceId>> for DayAssignments {
    type Error = ModelError;

    fn try_from(map: BTreeMap<UserId, SpaceId>) -> Result<Self, Self::Error> {
        let mut day = Self::new();
        for (user, space) in map {
            if day.is_taken(&space) {
                return Err(ModelError::DoubleBooked(space));
            }
            day.assign(user, space);
        }
        Ok(day)
    }
}

impl From<DayAssignments> for BTreeMap<UserId, SpaceId> {
    fn from(day: DayAssignments) -> Self {
        day.by_user
    }
}

/// Committed assignments over a range of dates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentLedger {
    days: BTreeMap<NaiveDate, DayAssignments>,
}

impl AssignmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, date: NaiveDate, day: DayAssignments) {
        self.days.insert(date, day);
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DayAssignments> {
        self.days.get(&date)
    }

    pub fn was_assigned(&self, user: &UserId, date: NaiveDate) -> bool {
        self.days.get(&date).is_some_and(|day| day.contains_user(user))
    }

    /// Number of days in `range` on which `user` held a space.
    pub fn count_for(&self, user: &UserId, range: RangeInclusive<NaiveDate>) -> u32 {
        if range.start() > range.end() {
            return 0;
        }
        let mut count = 0;
        for day in self.days.range(range).map(|(_, day)| day) {
            if day.contains_user(user) {
                count += 1;
            }
        }
        count
    }

    /// Length of the unbroken run of assigned days ending the day before `date`.
    pub fn consecutive_run_before(&self, user: &UserId, date: NaiveDate) -> u32 {
        let mut run = 0;
        let mut cursor = days_before(date, 1);
        while cursor < date && self.was_assigned(user, cursor) {
            run += 1;
            let previous = days_before(cursor, 1);
            if previous == cursor {
                break;
            }
            cursor = previous;
        }
        run
    }

    /// Assignments for `user` on or after `from`, ascending by date.
    pub fn upcoming_for(&self, user: &UserId, from: NaiveDate) -> Vec<Assignment> {
        self.days
            .range(from..)
            .filter_map(|(date, day)| {
                day.space_for(user).map(|space| Assignment {
                    date: *date,
                    user_id: user.clone(),
                    space_id: space.clone(),
                })
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &DayAssignments)> {
        self.days.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}
