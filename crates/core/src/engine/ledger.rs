//! Seat Ledger: occupied seats, one collision domain per session

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::resolver::{CollisionDomains, CollisionSet, DomainUnavailable, Reservation};

/// A seat held in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeatSlot {
    pub session_id: Uuid,
    pub seat_number: u32,
}

#[derive(Debug, Error)]
pub enum SeatError {
    #[error("seat {seat_number} is already occupied for session {session_id}")]
    Taken { session_id: Uuid, seat_number: u32 },

    #[error("seat {seat_number} is outside 1..={capacity}")]
    OutOfRange { seat_number: u32, capacity: u32 },

    #[error(transparent)]
    Unavailable(#[from] DomainUnavailable),
}

/// Occupied seat numbers of one session
#[derive(Default)]
pub struct SessionSeats(BTreeSet<u32>);

impl CollisionSet for SessionSeats {
    type Candidate = u32;
    type Id = u32;

    fn find_collision(&self, seat: &u32) -> Option<u32> {
        self.0.get(seat).copied()
    }

    fn insert(&mut self, seat: u32) -> u32 {
        self.0.insert(seat);
        seat
    }

    fn remove(&mut self, seat: &u32) -> bool {
        self.0.remove(seat)
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Authoritative record of occupied seats per session
pub struct SeatLedger {
    sessions: CollisionDomains<Uuid, SessionSeats>,
}

impl SeatLedger {
    pub fn new(shards: usize) -> Self {
        Self {
            sessions: CollisionDomains::new(shards),
        }
    }

    /// Occupy a seat iff it is within capacity and currently free
    pub fn try_occupy(&self, session_id: Uuid, seat_number: u32, capacity: u32) -> Result<SeatSlot, SeatError> {
        if seat_number == 0 || seat_number > capacity {
            return Err(SeatError::OutOfRange {
                seat_number,
                capacity,
            });
        }
        self.occupy(session_id, seat_number)
    }

    /// Re-occupy a seat recorded by a persisted active booking
    pub fn restore(&self, session_id: Uuid, seat_number: u32) -> Result<SeatSlot, SeatError> {
        self.occupy(session_id, seat_number)
    }

    fn occupy(&self, session_id: Uuid, seat_number: u32) -> Result<SeatSlot, SeatError> {
        match self.sessions.reserve_if_free(&session_id, seat_number)? {
            Reservation::Reserved(seat_number) => Ok(SeatSlot {
                session_id,
                seat_number,
            }),
            Reservation::Collided(seat_number) => Err(SeatError::Taken {
                session_id,
                seat_number,
            }),
        }
    }

    /// Free a seat; releasing an already free seat is a no-op
    pub fn release(&self, session_id: Uuid, seat_number: u32) -> Result<bool, DomainUnavailable> {
        self.sessions.release(&session_id, &seat_number)
    }

    pub fn occupied(&self, session_id: Uuid) -> Result<BTreeSet<u32>, DomainUnavailable> {
        Ok(self
            .sessions
            .inspect(&session_id, |seats| seats.0.clone())?
            .unwrap_or_default())
    }

    pub fn free_seats(&self, session_id: Uuid, capacity: u32) -> Result<BTreeSet<u32>, DomainUnavailable> {
        let occupied = self.occupied(session_id)?;
        Ok((1..=capacity).filter(|seat| !occupied.contains(seat)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_capacity_checked_first() {
        let ledger = SeatLedger::new(4);
        let session = Uuid::new_v4();

        assert!(matches!(
            ledger.try_occupy(session, 0, 50),
            Err(SeatError::OutOfRange { seat_number: 0, .. })
        ));
        assert!(matches!(
            ledger.try_occupy(session, 51, 50),
            Err(SeatError::OutOfRange { capacity: 50, .. })
        ));
        assert!(ledger.occupied(session).unwrap().is_empty());
        assert!(ledger.try_occupy(session, 50, 50).is_ok());
    }

    #[test]
    fn test_taken_names_the_seat() {
        let ledger = SeatLedger::new(4);
        let session = Uuid::new_v4();
        ledger.try_occupy(session, 12, 50).unwrap();

        match ledger.try_occupy(session, 12, 50) {
            Err(SeatError::Taken {
                session_id,
                seat_number,
            }) => {
                assert_eq!(session_id, session);
                assert_eq!(seat_number, 12);
            }
            other => panic!("expected taken, got {other:?}"),
        }
        assert!(ledger.try_occupy(Uuid::new_v4(), 12, 50).is_ok());
    }

    #[test]
    fn test_release_idempotent() {
        let ledger = SeatLedger::new(4);
        let session = Uuid::new_v4();
        ledger.try_occupy(session, 3, 10).unwrap();

        assert!(ledger.release(session, 3).unwrap());
        assert!(!ledger.release(session, 3).unwrap());
        assert!(!ledger.release(session, 9).unwrap());
        assert!(ledger.try_occupy(session, 3, 10).is_ok());
    }

    #[test]
    fn test_free_seats() {
        let ledger = SeatLedger::new(4);
        let session = Uuid::new_v4();
        ledger.try_occupy(session, 2, 5).unwrap();
        ledger.try_occupy(session, 4, 5).unwrap();

        let free: Vec<_> = ledger.free_seats(session, 5).unwrap().into_iter().collect();
        assert_eq!(free, vec![1, 3, 5]);
    }

    #[test]
    fn test_concurrent_same_seat() {
        let ledger = SeatLedger::new(8);
        let session = Uuid::new_v4();
        let wins = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..50 {
                scope.spawn(|| {
                    if ledger.try_occupy(session, 7, 10).is_ok() {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(wins.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.occupied(session).unwrap().len(), 1);
    }
}
