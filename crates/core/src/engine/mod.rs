//! Session & seat booking engine
//!
//! Admission runs in three steps: validate references through the lookup
//! traits, commit against the in-memory authority (interval store or seat
//! ledger), then persist. A failed persist rolls the in-memory commit back.
//! Both authorities are rebuilt from storage when the engine is opened.

mod bookings;
mod catalog;
pub mod idempotency;
pub mod intervals;
pub mod ledger;
pub mod resolver;
mod sessions;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::storage::Storage;

pub use idempotency::InFlightKeys;
pub use intervals::{IntervalError, IntervalId, IntervalStore};
pub use ledger::{SeatError, SeatLedger, SeatSlot};
pub use resolver::{CollisionDomains, CollisionSet, DomainUnavailable, Reservation};

/// Tunables for the engine's in-memory structures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Index shards per collision-domain map
    pub lock_shards: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_shards: resolver::DEFAULT_SHARDS,
        }
    }
}

/// What `recover` rebuilt from storage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub sessions: usize,
    pub seats: usize,
    /// Persisted rows that collided with already restored state
    pub skipped: usize,
}

/// Admission engine over a storage backend
pub struct BookingEngine<S> {
    storage: S,
    intervals: IntervalStore,
    ledger: SeatLedger,
    in_flight: InFlightKeys,
}

impl<S: Storage> BookingEngine<S> {
    /// Create an engine with empty in-memory state
    pub fn new(storage: S, config: EngineConfig) -> Self {
        Self {
            storage,
            intervals: IntervalStore::new(config.lock_shards),
            ledger: SeatLedger::new(config.lock_shards),
            in_flight: InFlightKeys::new(config.lock_shards),
        }
    }

    /// Create an engine and rebuild its state from storage
    pub fn open(storage: S, config: EngineConfig) -> Result<Self> {
        let engine = Self::new(storage, config);
        engine.recover()?;
        Ok(engine)
    }

    /// Re-commit every persisted session interval and active seat
    ///
    /// Seats whose booking was cancelled but never released from the ledger
    /// come back free, since only active bookings are replayed.
    #[instrument(skip(self))]
    pub fn recover(&self) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();

        for session in self.storage.list_sessions()? {
            let range = match session.range() {
                Ok(range) => range,
                Err(e) => {
                    warn!(session_id = %session.id, error = %e, "Persisted session has no valid interval; not restored");
                    report.skipped += 1;
                    continue;
                }
            };
            match self
                .intervals
                .restore(session.hall_id, IntervalId(session.id), range)
            {
                Ok(()) => report.sessions += 1,
                Err(IntervalError::Conflict { conflicting }) => {
                    warn!(
                        session_id = %session.id,
                        conflicting = %conflicting,
                        "Persisted session overlaps another; not restored"
                    );
                    report.skipped += 1;
                }
                Err(IntervalError::Unavailable(e)) => return Err(e.into()),
            }
        }

        for booking in self.storage.list_active_bookings()? {
            match self.ledger.restore(booking.session_id, booking.seat_number) {
                Ok(_) => report.seats += 1,
                Err(SeatError::Unavailable(e)) => return Err(e.into()),
                Err(e) => {
                    warn!(booking_id = %booking.id, error = %e, "Active booking not restored");
                    report.skipped += 1;
                }
            }
        }

        info!(
            sessions = report.sessions,
            seats = report.seats,
            skipped = report.skipped,
            "Engine state recovered"
        );
        Ok(report)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn intervals(&self) -> &IntervalStore {
        &self.intervals
    }

    pub fn ledger(&self) -> &SeatLedger {
        &self.ledger
    }
}
