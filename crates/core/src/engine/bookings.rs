//! Booking admission, cancellation, and seat availability

use std::collections::BTreeSet;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::ledger::SeatError;
use super::BookingEngine;
use crate::error::{EntityKind, Error, Result};
use crate::invariants::{assert_booking_invariants, assert_seats_within_capacity};
use crate::models::{Booking, BookingStatus, Hall, NewBooking, Session};
use crate::storage::{is_unique_violation, Storage};

impl<S: Storage> BookingEngine<S> {
    /// Admit a booking iff its seat exists and is free for the session
    #[instrument(skip(self, request), fields(session_id = %request.session_id, seat = request.seat_number))]
    pub fn admit_booking(&self, request: NewBooking) -> Result<Booking> {
        let key = request.idempotency_key.clone();
        self.in_flight
            .run_exclusive(key.map(|k| format!("booking:{k}")), || {
                if let Some(existing) = self.replayed_booking(&request)? {
                    return Ok(existing);
                }
                self.commit_booking(request)
            })
    }

    fn replayed_booking(&self, request: &NewBooking) -> Result<Option<Booking>> {
        let Some(key) = request.idempotency_key.as_deref() else {
            return Ok(None);
        };
        match self.storage.find_booking_by_idempotency_key(key)? {
            Some(booking) if request.matches(&booking) => {
                info!(booking_id = %booking.id, "Replaying booking admission");
                Ok(Some(booking))
            }
            Some(_) => Err(Error::Validation(format!(
                "idempotency key '{key}' was already used for a different booking"
            ))),
            None => Ok(None),
        }
    }

    fn commit_booking(&self, request: NewBooking) -> Result<Booking> {
        let (session, hall) = self.session_with_hall(request.session_id)?;
        let seat_number = request.seat_number;

        match self.ledger.try_occupy(session.id, seat_number, hall.capacity) {
            Ok(_) => {}
            Err(SeatError::Taken { .. }) => {
                debug!(seat = seat_number, "Seat already occupied");
                return Err(Error::SeatTaken {
                    session_id: session.id,
                    seat_number,
                });
            }
            Err(SeatError::OutOfRange { capacity, .. }) => {
                return Err(Error::Validation(format!(
                    "seat {seat_number} does not exist; hall {} has seats 1..={capacity}",
                    hall.id
                )));
            }
            Err(SeatError::Unavailable(e)) => return Err(e.into()),
        }

        let booking = Booking::new(request.user_id, session.id, seat_number)
            .with_idempotency_key(request.idempotency_key);

        if let Err(e) = self.storage.create_booking(&booking) {
            self.roll_back_seat(session.id, seat_number);
            return Err(match e {
                Error::Database(ref db) if is_unique_violation(db) => {
                    if booking.idempotency_key.is_some() {
                        Error::Indeterminate(
                            "a booking with this idempotency key was persisted concurrently".into(),
                        )
                    } else {
                        Error::SeatTaken {
                            session_id: session.id,
                            seat_number,
                        }
                    }
                }
                other => other,
            });
        }

        assert_booking_invariants(&booking);
        if cfg!(debug_assertions) {
            if let Ok(occupied) = self.ledger.occupied(session.id) {
                assert_seats_within_capacity(session.id, &occupied, hall.capacity);
            }
        }

        info!(booking_id = %booking.id, user_id = %booking.user_id, "Booking admitted");
        Ok(booking)
    }

    fn roll_back_seat(&self, session_id: Uuid, seat_number: u32) {
        match self.ledger.release(session_id, seat_number) {
            Ok(_) => warn!(seat = seat_number, "Booking not persisted; seat released"),
            Err(e) => error!(seat = seat_number, error = %e, "Failed to release seat after persist failure"),
        }
    }

    fn session_with_hall(&self, session_id: Uuid) -> Result<(Session, Hall)> {
        let session = self
            .storage
            .find_session(session_id)?
            .ok_or_else(|| Error::not_found(EntityKind::Session, session_id))?;
        let hall = self
            .storage
            .find_hall(session.hall_id)?
            .ok_or_else(|| Error::not_found(EntityKind::Hall, session.hall_id))?;
        Ok((session, hall))
    }

    /// Cancel the caller's own active booking and free its seat
    pub fn cancel_booking(&self, booking_id: Uuid, caller: Uuid) -> Result<Booking> {
        self.cancel_booking_authorized(booking_id, caller, |booking| booking.is_owned_by(caller))
    }

    /// Cancel an active booking if `authorize` accepts it
    ///
    /// The persisted status flips first, so concurrent cancellations
    /// transition the booking exactly once. Only the winner frees the seat.
    #[instrument(skip(self, authorize))]
    pub fn cancel_booking_authorized(
        &self,
        booking_id: Uuid,
        caller: Uuid,
        authorize: impl FnOnce(&Booking) -> bool,
    ) -> Result<Booking> {
        let mut booking = self
            .storage
            .find_booking(booking_id)?
            .ok_or_else(|| Error::not_found(EntityKind::Booking, booking_id))?;

        if !authorize(&booking) {
            warn!(owner = %booking.user_id, "Cancellation refused");
            return Err(Error::PermissionDenied(format!(
                "user {caller} may not cancel booking {booking_id}"
            )));
        }
        if !booking.is_active() {
            return Err(Error::InvalidState(format!(
                "booking {booking_id} is already cancelled"
            )));
        }

        let cancelled_at = Utc::now();
        if !self.storage.cancel_booking(booking_id, cancelled_at)? {
            return Err(Error::InvalidState(format!(
                "booking {booking_id} is already cancelled"
            )));
        }

        // Recovery only replays active bookings, so a failed release heals on restart
        if let Err(e) = self.ledger.release(booking.session_id, booking.seat_number) {
            error!(error = %e, "Booking cancelled but seat not released");
        }

        booking.status = BookingStatus::Cancelled;
        booking.cancelled_at = Some(cancelled_at);
        assert_booking_invariants(&booking);

        info!(seat = booking.seat_number, session_id = %booking.session_id, "Booking cancelled");
        Ok(booking)
    }

    /// Seats of a session with no active booking, ascending
    #[instrument(skip(self))]
    pub fn list_free_seats(&self, session_id: Uuid) -> Result<Vec<u32>> {
        let (session, hall) = self.session_with_hall(session_id)?;
        let free: BTreeSet<u32> = self.ledger.free_seats(session.id, hall.capacity)?;
        Ok(free.into_iter().collect())
    }

    pub fn find_booking(&self, booking_id: Uuid) -> Result<Booking> {
        self.storage
            .find_booking(booking_id)?
            .ok_or_else(|| Error::not_found(EntityKind::Booking, booking_id))
    }

    pub fn list_bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>> {
        self.storage.list_bookings_for_user(user_id)
    }

    pub fn list_bookings(&self) -> Result<Vec<Booking>> {
        self.storage.list_bookings()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{at, engine, seed};
    use super::*;
    use crate::models::{NewSession, SessionEnd};
    use crate::storage::{BookingRepository, Database};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn session(engine: &BookingEngine<Database>, capacity: u32) -> Session {
        let (film, hall) = seed(engine, capacity);
        engine
            .admit_session(NewSession::new(
                film.id,
                hall.id,
                at(18, 0),
                SessionEnd::At { end: at(20, 0) },
                12.0,
            ))
            .unwrap()
    }

    #[test]
    fn test_fifty_seat_scenario() {
        let engine = engine();
        let session = session(&engine, 50);
        let user = Uuid::new_v4();

        let booking = engine
            .admit_booking(NewBooking::new(user, session.id, 12))
            .unwrap();
        assert!(booking.is_active());

        let free = engine.list_free_seats(session.id).unwrap();
        assert_eq!(free.len(), 49);
        assert!(!free.contains(&12));

        assert!(matches!(
            engine.admit_booking(NewBooking::new(Uuid::new_v4(), session.id, 12)),
            Err(Error::SeatTaken { seat_number: 12, .. })
        ));

        let cancelled = engine.cancel_booking(booking.id, user).unwrap();
        assert!(!cancelled.is_active());
        assert!(cancelled.cancelled_at.is_some());
        assert_eq!(engine.list_free_seats(session.id).unwrap().len(), 50);

        engine
            .admit_booking(NewBooking::new(Uuid::new_v4(), session.id, 12))
            .unwrap();
    }

    #[test]
    fn test_seat_bounds() {
        let engine = engine();
        let session = session(&engine, 50);
        let user = Uuid::new_v4();

        engine.admit_booking(NewBooking::new(user, session.id, 1)).unwrap();
        engine.admit_booking(NewBooking::new(user, session.id, 50)).unwrap();
        for seat in [0, 51] {
            assert!(matches!(
                engine.admit_booking(NewBooking::new(user, session.id, seat)),
                Err(Error::Validation(_))
            ));
        }
    }

    #[test]
    fn test_missing_session() {
        let engine = engine();
        assert!(matches!(
            engine.admit_booking(NewBooking::new(Uuid::new_v4(), Uuid::new_v4(), 1)),
            Err(Error::NotFound { kind: EntityKind::Session, .. })
        ));
        assert!(matches!(
            engine.list_free_seats(Uuid::new_v4()),
            Err(Error::NotFound { kind: EntityKind::Session, .. })
        ));
    }

    #[test]
    fn test_double_cancel_is_invalid_state() {
        let engine = engine();
        let session = session(&engine, 10);
        let user = Uuid::new_v4();
        let booking = engine.admit_booking(NewBooking::new(user, session.id, 3)).unwrap();

        engine.cancel_booking(booking.id, user).unwrap();
        assert!(matches!(
            engine.cancel_booking(booking.id, user),
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            engine.cancel_booking(Uuid::new_v4(), user),
            Err(Error::NotFound { kind: EntityKind::Booking, .. })
        ));
    }

    #[test]
    fn test_only_owner_cancels() {
        let engine = engine();
        let session = session(&engine, 10);
        let owner = Uuid::new_v4();
        let booking = engine.admit_booking(NewBooking::new(owner, session.id, 3)).unwrap();

        assert!(matches!(
            engine.cancel_booking(booking.id, Uuid::new_v4()),
            Err(Error::PermissionDenied(_))
        ));
        assert!(engine.find_booking(booking.id).unwrap().is_active());

        let admin = Uuid::new_v4();
        engine
            .cancel_booking_authorized(booking.id, admin, |_| true)
            .unwrap();
        assert!(!engine.find_booking(booking.id).unwrap().is_active());
    }

    #[test]
    fn test_concurrent_bookings_for_one_seat() {
        let engine = engine();
        let session = session(&engine, 50);
        let admitted = AtomicUsize::new(0);
        let taken = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| {
                    match engine.admit_booking(NewBooking::new(Uuid::new_v4(), session.id, 7)) {
                        Ok(_) => admitted.fetch_add(1, Ordering::SeqCst),
                        Err(Error::SeatTaken { .. }) => taken.fetch_add(1, Ordering::SeqCst),
                        Err(e) => panic!("unexpected error: {e}"),
                    };
                });
            }
        });

        assert_eq!(admitted.load(Ordering::SeqCst), 1);
        assert_eq!(taken.load(Ordering::SeqCst), 15);
        assert_eq!(engine.storage().list_active_bookings().unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_cancellations_transition_once() {
        let engine = engine();
        let session = session(&engine, 10);
        let user = Uuid::new_v4();
        let booking = engine.admit_booking(NewBooking::new(user, session.id, 5)).unwrap();
        let cancelled = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| match engine.cancel_booking(booking.id, user) {
                    Ok(_) => {
                        cancelled.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(Error::InvalidState(_)) => {}
                    Err(e) => panic!("unexpected error: {e}"),
                });
            }
        });

        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(engine.list_free_seats(session.id).unwrap().len(), 10);
    }

    #[test]
    fn test_full_hall() {
        let engine = engine();
        let session = session(&engine, 3);
        for seat in 1..=3 {
            engine
                .admit_booking(NewBooking::new(Uuid::new_v4(), session.id, seat))
                .unwrap();
        }
        assert!(engine.list_free_seats(session.id).unwrap().is_empty());
        assert!(matches!(
            engine.admit_booking(NewBooking::new(Uuid::new_v4(), session.id, 2)),
            Err(Error::SeatTaken { .. })
        ));
    }

    #[test]
    fn test_idempotent_booking_retry() {
        let engine = engine();
        let session = session(&engine, 10);
        let user = Uuid::new_v4();
        let request = NewBooking::new(user, session.id, 4).with_idempotency_key("order-17");

        let first = engine.admit_booking(request.clone()).unwrap();
        let retry = engine.admit_booking(request).unwrap();
        assert_eq!(first.id, retry.id);
        assert_eq!(engine.list_bookings_for_user(user).unwrap().len(), 1);
        assert_eq!(engine.list_bookings().unwrap().len(), 1);

        let reused = NewBooking::new(user, session.id, 5).with_idempotency_key("order-17");
        assert!(matches!(engine.admit_booking(reused), Err(Error::Validation(_))));
    }
}
