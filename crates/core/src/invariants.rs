//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::engine::IntervalId;
use crate::models::{Booking, BookingStatus, Hall, TimeRange};

/// Validate that no two committed intervals of a hall overlap
pub fn assert_sessions_disjoint(hall_id: Uuid, committed: &[(IntervalId, TimeRange)]) {
    let mut sorted: Vec<_> = committed.iter().collect();
    sorted.sort_by_key(|(_, range)| range.start());

    for pair in sorted.windows(2) {
        let (a_id, a) = pair[0];
        let (b_id, b) = pair[1];
        debug_assert!(
            a.end() <= b.start(),
            "Hall {} has overlapping sessions {} {} and {} {}",
            hall_id,
            a_id,
            a,
            b_id,
            b
        );
    }
}

/// Validate that a hall can seat anyone at all
pub fn assert_hall_invariants(hall: &Hall) {
    debug_assert!(hall.capacity > 0, "Hall {} has zero capacity", hall.id);

    debug_assert!(
        !hall.name.trim().is_empty(),
        "Hall {} has empty name",
        hall.id
    );
}

/// Validate that a booking's status and timestamps agree
pub fn assert_booking_invariants(booking: &Booking) {
    debug_assert!(
        booking.seat_number >= 1,
        "Booking {} has seat number 0",
        booking.id
    );

    match booking.status {
        BookingStatus::Active => debug_assert!(
            booking.cancelled_at.is_none(),
            "Active booking {} has a cancellation time",
            booking.id
        ),
        BookingStatus::Cancelled => debug_assert!(
            booking.cancelled_at.is_some(),
            "Cancelled booking {} has no cancellation time",
            booking.id
        ),
    }
}

/// Validate that every occupied seat of a session exists in its hall
pub fn assert_seats_within_capacity(session_id: Uuid, occupied: &BTreeSet<u32>, capacity: u32) {
    debug_assert!(
        occupied.len() <= capacity as usize,
        "Session {} has {} occupied seats but capacity {}",
        session_id,
        occupied.len(),
        capacity
    );

    if let (Some(&first), Some(&last)) = (occupied.first(), occupied.last()) {
        debug_assert!(
            first >= 1 && last <= capacity,
            "Session {} has seats outside 1..={}: {:?}",
            session_id,
            capacity,
            occupied
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn range(start: u32, end: u32) -> TimeRange {
        TimeRange::new(
            Utc.with_ymd_and_hms(2024, 1, 1, start, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, end, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_touching_sessions_are_disjoint() {
        let committed = vec![
            (IntervalId::new(), range(12, 14)),
            (IntervalId::new(), range(10, 12)),
        ];
        assert_sessions_disjoint(Uuid::new_v4(), &committed);
    }

    #[test]
    #[should_panic(expected = "overlapping sessions")]
    fn test_overlap_detected() {
        let committed = vec![
            (IntervalId::new(), range(10, 13)),
            (IntervalId::new(), range(12, 14)),
        ];
        assert_sessions_disjoint(Uuid::new_v4(), &committed);
    }

    #[test]
    fn test_valid_hall_and_booking() {
        assert_hall_invariants(&Hall::new("Main".to_string(), 10));

        let mut booking = Booking::new(Uuid::new_v4(), Uuid::new_v4(), 3);
        assert_booking_invariants(&booking);

        booking.status = BookingStatus::Cancelled;
        booking.cancelled_at = Some(Utc::now());
        assert_booking_invariants(&booking);
    }

    #[test]
    #[should_panic(expected = "no cancellation time")]
    fn test_cancelled_without_timestamp() {
        let mut booking = Booking::new(Uuid::new_v4(), Uuid::new_v4(), 3);
        booking.status = BookingStatus::Cancelled;
        assert_booking_invariants(&booking);
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn test_seat_beyond_capacity() {
        let occupied: BTreeSet<u32> = [1, 2, 11].into_iter().collect();
        assert_seats_within_capacity(Uuid::new_v4(), &occupied, 10);
    }
}
