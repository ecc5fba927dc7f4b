use chrono::NaiveDate;
use tracing::debug;

use super::eligibility::{check_limits, weekend_closed, Ineligibility};
use super::scoring::{rank, score, AllocationHistory, ScoredCandidate};
use super::types::{Candidate, DayPlan, Rejection};
use crate::model::{DayAssignments, ExclusionSet, ParkingInventory, ParkingSpace};
use crate::settings::ValidatedSettings;

/// Allocates parking spaces for a single date.
///
/// Pure: the same inputs always produce the same map, and nothing is persisted.
pub fn allocate(
    date: NaiveDate,
    candidates: &[Candidate],
    inventory: &ParkingInventory,
    exclusions: &ExclusionSet,
    settings: &ValidatedSettings,
    history: &AllocationHistory,
) -> DayAssignments {
    plan_day(date, candidates, inventory, exclusions, settings, history).assignments
}

/// Same as [`allocate`], also reporting who was rejected and who was left without a space.
pub fn plan_day(
    date: NaiveDate,
    candidates: &[Candidate],
    inventory: &ParkingInventory,
    exclusions: &ExclusionSet,
    settings: &ValidatedSettings,
    history: &AllocationHistory,
) -> DayPlan {
    if weekend_closed(date, settings) {
        debug!(%date, "weekend parking disabled");
        return DayPlan::closed(date);
    }

    let mut plan = DayPlan::new(date);

    // One entry per user, in id order
    let mut pool: Vec<&Candidate> = candidates.iter().collect();
    pool.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    pool.dedup_by(|a, b| a.user_id == b.user_id);

    pool.retain(|c| {
        if exclusions.is_excluded(&c.user_id, date) {
            plan.rejected.push(Rejection {
                user_id: c.user_id.clone(),
                reason: Ineligibility::Excluded,
            });
            false
        } else {
            true
        }
    });

    claim_reserved_spaces(&mut plan, &pool, inventory);
    pool.retain(|c| !plan.assignments.contains_user(&c.user_id));

    let trailing_days = history.trailing_days();
    let mut scored: Vec<ScoredCandidate<'_>> = Vec::with_capacity(pool.len());
    for candidate in pool {
        let stats = history.for_user(&candidate.user_id);
        let run = history.consecutive_run_before(&candidate.user_id, date);
        match check_limits(&stats, run, settings) {
            Ok(()) => scored.push(ScoredCandidate {
                candidate,
                score: score(&stats, settings, trailing_days),
            }),
            Err(reason) => {
                debug!(%date, user = %candidate.user_id, ?reason, "candidate not eligible");
                plan.rejected.push(Rejection {
                    user_id: candidate.user_id.clone(),
                    reason,
                });
            }
        }
    }
    rank(&mut scored);

    assign_open_spaces(&mut plan, &scored, inventory, settings);
    plan
}

/// Reserved spaces go to their owner when the owner is among the candidates; otherwise they stay empty.
fn claim_reserved_spaces(plan: &mut DayPlan, pool: &[&Candidate], inventory: &ParkingInventory) {
    for space in inventory.iter() {
        let Some(owner) = space.reserved_owner() else {
            continue;
        };
        if pool.iter().any(|c| &c.user_id == owner)
            && plan.assignments.assign(owner.clone(), space.id.clone())
        {
            debug!(date = %plan.date, user = %owner, space = %space.id, "reserved space claimed by owner");
        }
    }
}

/// Walks the ranked list once, giving each candidate the first free compatible space.
fn assign_open_spaces(
    plan: &mut DayPlan,
    ranked: &[ScoredCandidate<'_>],
    inventory: &ParkingInventory,
    settings: &ValidatedSettings,
) {
    let open_spaces: Vec<&ParkingSpace> = inventory.iter().filter(|s| !s.reserved).collect();
    let capacity = usize::try_from(settings.general_capacity())
        .unwrap_or(usize::MAX)
        .min(open_spaces.len());
    let mut taken = vec![false; open_spaces.len()];
    let mut granted = 0;

    for entry in ranked {
        let candidate = entry.candidate;
        if granted == capacity {
            plan.unassigned.push(candidate.user_id.clone());
            continue;
        }

        let free = open_spaces
            .iter()
            .enumerate()
            .find(|(i, space)| !taken[*i] && space.space_type.suits(candidate.required_space));

        match free {
            Some((i, space)) => {
                taken[i] = true;
                granted += 1;
                plan.assignments
                    .assign(candidate.user_id.clone(), space.id.clone());
                debug!(date = %plan.date, user = %candidate.user_id, space = %space.id, score = entry.score, "space assigned");
            }
            None => plan.unassigned.push(candidate.user_id.clone()),
        }
    }
}
