//! Interval Store: committed session intervals, one collision domain per hall

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::resolver::{CollisionDomains, CollisionSet, DomainUnavailable, Reservation};
use crate::models::TimeRange;

/// Identifier of a committed interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IntervalId(pub Uuid);

impl IntervalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for IntervalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IntervalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Error)]
pub enum IntervalError {
    #[error("interval overlaps committed interval {conflicting}")]
    Conflict { conflicting: IntervalId },

    #[error(transparent)]
    Unavailable(#[from] DomainUnavailable),
}

/// Candidate interval together with the id it will be committed under
pub struct IntervalClaim {
    pub id: IntervalId,
    pub range: TimeRange,
}

/// Disjoint intervals of one hall, ordered by start
#[derive(Default)]
pub struct HallIntervals {
    by_start: BTreeMap<(DateTime<Utc>, IntervalId), DateTime<Utc>>,
    ranges: HashMap<IntervalId, TimeRange>,
}

impl HallIntervals {
    fn lower_bound(start: DateTime<Utc>) -> (DateTime<Utc>, IntervalId) {
        (start, IntervalId(Uuid::nil()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (IntervalId, DateTime<Utc>, DateTime<Utc>)> + '_ {
        self.by_start
            .iter()
            .map(|(&(start, id), &end)| (id, start, end))
    }
}

impl CollisionSet for HallIntervals {
    type Candidate = IntervalClaim;
    type Id = IntervalId;

    // Members are pairwise disjoint, so only the nearest neighbour on
    // each side of the candidate's start can overlap it.
    fn find_collision(&self, claim: &IntervalClaim) -> Option<IntervalId> {
        let bound = Self::lower_bound(claim.range.start());

        if let Some((&(start, id), _)) = self.by_start.range(bound..).next() {
            if start < claim.range.end() {
                return Some(id);
            }
        }

        if let Some((&(_, id), &end)) = self.by_start.range(..bound).next_back() {
            if end > claim.range.start() {
                return Some(id);
            }
        }

        None
    }

    fn insert(&mut self, claim: IntervalClaim) -> IntervalId {
        self.by_start
            .insert((claim.range.start(), claim.id), claim.range.end());
        self.ranges.insert(claim.id, claim.range);
        claim.id
    }

    fn remove(&mut self, id: &IntervalId) -> bool {
        match self.ranges.remove(id) {
            Some(range) => {
                self.by_start.remove(&(range.start(), *id));
                true
            }
            None => false,
        }
    }

    fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Authoritative record of committed session intervals per hall
pub struct IntervalStore {
    halls: CollisionDomains<Uuid, HallIntervals>,
}

impl IntervalStore {
    pub fn new(shards: usize) -> Self {
        Self {
            halls: CollisionDomains::new(shards),
        }
    }

    /// Commit `range` for `hall_id` iff it is disjoint from every committed interval there
    pub fn try_commit(&self, hall_id: Uuid, range: TimeRange) -> Result<IntervalId, IntervalError> {
        self.commit_as(hall_id, IntervalId::new(), range)
    }

    /// Re-commit a persisted interval under its original id
    pub fn restore(&self, hall_id: Uuid, id: IntervalId, range: TimeRange) -> Result<(), IntervalError> {
        self.commit_as(hall_id, id, range).map(|_| ())
    }

    fn commit_as(&self, hall_id: Uuid, id: IntervalId, range: TimeRange) -> Result<IntervalId, IntervalError> {
        match self.halls.reserve_if_free(&hall_id, IntervalClaim { id, range })? {
            Reservation::Reserved(id) => Ok(id),
            Reservation::Collided(conflicting) => Err(IntervalError::Conflict { conflicting }),
        }
    }

    /// Release a committed interval; releasing an unknown id is a no-op
    pub fn release(&self, hall_id: Uuid, id: IntervalId) -> Result<bool, DomainUnavailable> {
        self.halls.release(&hall_id, &id)
    }

    /// Snapshot of the hall's committed intervals, ordered by start
    pub fn committed(&self, hall_id: Uuid) -> Result<Vec<(IntervalId, TimeRange)>, DomainUnavailable> {
        let snapshot = self.halls.inspect(&hall_id, |set| {
            set.iter()
                .filter_map(|(id, start, end)| TimeRange::new(start, end).ok().map(|r| (id, r)))
                .collect::<Vec<_>>()
        })?;
        Ok(snapshot.unwrap_or_default())
    }

    pub fn has_committed(&self, hall_id: Uuid) -> Result<bool, DomainUnavailable> {
        Ok(self.halls.inspect(&hall_id, |set| !set.is_empty())?.unwrap_or(false))
    }
}
