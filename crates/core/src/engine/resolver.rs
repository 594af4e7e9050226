//! Reserve-if-free primitive shared by every admission structure
//!
//! Admission state is partitioned into collision domains (one hall, one
//! session, one idempotency key). Each domain sits behind its own mutex and a
//! concurrent index maps domain keys to domain handles. Candidates in
//! different domains never touch the same domain lock; index entries are
//! held only long enough to look up, create or unlink a handle.
//!
//! A domain whose set becomes empty is unlinked from the index so the index
//! does not grow without bound. Unlinked domains are marked retired first, and
//! any caller that locks a retired domain goes back to the index for a fresh
//! one, so a reservation can never land in a set nobody else can see.

use std::hash::Hash;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use thiserror::Error;

use crate::error::Error;

/// Default number of index shards
pub const DEFAULT_SHARDS: usize = 64;

/// A keyed set whose members may collide with candidates
pub trait CollisionSet: Default {
    type Candidate;
    type Id: Copy;

    /// Id of an existing member the candidate collides with
    fn find_collision(&self, candidate: &Self::Candidate) -> Option<Self::Id>;

    /// Insert a candidate already known to be collision-free
    fn insert(&mut self, candidate: Self::Candidate) -> Self::Id;

    /// Remove a member; returns whether it was present
    fn remove(&mut self, id: &Self::Id) -> bool;

    fn is_empty(&self) -> bool;
}

/// Outcome of a reserve-if-free attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation<I> {
    /// The candidate was inserted under this id
    Reserved(I),
    /// Nothing was inserted; this member already holds the slot
    Collided(I),
}

/// A domain lock was poisoned by a panicking holder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("collision domain lock poisoned")]
pub struct DomainUnavailable;

impl From<DomainUnavailable> for Error {
    fn from(e: DomainUnavailable) -> Self {
        Error::Unavailable(e.to_string())
    }
}

struct Domain<S> {
    set: S,
    retired: bool,
}

type Handle<S> = Arc<Mutex<Domain<S>>>;

/// Concurrent index of independently locked collision domains
pub struct CollisionDomains<K, S> {
    domains: DashMap<K, Handle<S>>,
}

impl<K, S> CollisionDomains<K, S>
where
    K: Hash + Eq + Clone,
    S: CollisionSet,
{
    /// `shards` is rounded up to the power of two (at least 2) the index requires
    pub fn new(shards: usize) -> Self {
        Self {
            domains: DashMap::with_shard_amount(shards.max(2).next_power_of_two()),
        }
    }

    fn handle(&self, key: &K) -> Handle<S> {
        let entry = self.domains.entry(key.clone()).or_insert_with(|| {
            Arc::new(Mutex::new(Domain {
                set: S::default(),
                retired: false,
            }))
        });
        Arc::clone(entry.value())
    }

    fn existing(&self, key: &K) -> Option<Handle<S>> {
        self.domains.get(key).map(|entry| Arc::clone(entry.value()))
    }

    fn unlink(&self, key: &K, handle: &Handle<S>) {
        self.domains
            .remove_if(key, |_, current| Arc::ptr_eq(current, handle));
    }

    /// Insert `candidate` into the domain for `key` iff it collides with no member
    ///
    /// Atomic per domain: of any number of concurrent colliding candidates,
    /// the first to take the domain lock is reserved and every later one
    /// observes the collision.
    pub fn reserve_if_free(
        &self,
        key: &K,
        candidate: S::Candidate,
    ) -> Result<Reservation<S::Id>, DomainUnavailable> {
        loop {
            let handle = self.handle(key);
            let mut domain = handle.lock().map_err(|_| DomainUnavailable)?;

            if domain.retired {
                drop(domain);
                self.unlink(key, &handle);
                continue;
            }

            if let Some(existing) = domain.set.find_collision(&candidate) {
                return Ok(Reservation::Collided(existing));
            }

            let id = domain.set.insert(candidate);
            return Ok(Reservation::Reserved(id));
        }
    }

    /// Remove a member from the domain for `key`
    ///
    /// Releasing an absent member is a no-op that returns `false`.
    pub fn release(&self, key: &K, id: &S::Id) -> Result<bool, DomainUnavailable> {
        loop {
            let Some(handle) = self.existing(key) else {
                return Ok(false);
            };
            let mut domain = handle.lock().map_err(|_| DomainUnavailable)?;

            if domain.retired {
                drop(domain);
                self.unlink(key, &handle);
                continue;
            }

            let removed = domain.set.remove(id);
            let emptied = domain.set.is_empty();
            if emptied {
                domain.retired = true;
            }
            drop(domain);

            if emptied {
                self.unlink(key, &handle);
            }
            return Ok(removed);
        }
    }

    /// Run a read-only view over the domain for `key`
    ///
    /// Returns `None` when the domain holds no members.
    pub fn inspect<T>(
        &self,
        key: &K,
        view: impl FnOnce(&S) -> T,
    ) -> Result<Option<T>, DomainUnavailable> {
        let Some(handle) = self.existing(key) else {
            return Ok(None);
        };
        let domain = handle.lock().map_err(|_| DomainUnavailable)?;
        if domain.retired {
            return Ok(None);
        }
        Ok(Some(view(&domain.set)))
    }

    /// Number of domains currently linked into the index
    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }
}
