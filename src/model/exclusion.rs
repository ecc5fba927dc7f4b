use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::UserId;
use crate::error::ModelError;

/// A period during which a user must not receive a parking assignment.
/// A missing end date makes the exclusion permanent from `start_date` on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ExclusionDoc")]
pub struct Exclusion {
    id: u64,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExclusionDoc {
    id: u64,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ExclusionDoc> for Exclusion {
    type Error = ModelError;

    fn try_from(doc: ExclusionDoc) -> Result<Self, Self::Error> {
        Self::new(doc.id, doc.start_date, doc.end_date, doc.reason, doc.created_at)
    }
}

impl Exclusion {
    pub fn new(
        id: u64,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        reason: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ModelError> {
        if let Some(end) = end_date {
            if end < start_date {
                return Err(ModelError::ExclusionRange { start: start_date, end });
            }
        }
        let reason = reason.filter(|r| !r.trim().is_empty());
        Ok(Self {
            id,
            start_date,
            end_date,
            reason,
            created_at,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn is_permanent(&self) -> bool {
        self.end_date.is_none()
    }

    /// Bounded exclusions cover `[start, end]` inclusive; permanent ones every date from `start`.
    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.start_date && self.end_date.map_or(true, |end| date <= end)
    }
}

/// Exclusions grouped by owner.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    by_user: BTreeMap<UserId, Vec<Exclusion>>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, user: UserId, exclusions: Vec<Exclusion>) {
        if !exclusions.is_empty() {
            self.by_user.entry(user).or_default().extend(exclusions);
        }
    }

    pub fn for_user(&self, user: &UserId) -> &[Exclusion] {
        self.by_user.get(user).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_excluded(&self, user: &UserId, date: NaiveDate) -> bool {
        crate::schedule::eligibility::is_excluded(self.for_user(user), date)
    }
}
