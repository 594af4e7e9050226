//! Booking model - one seat reserved for one session

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Booking lifecycle: `Active -> Cancelled`, nothing else
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Active,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Active => "active",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A seat reservation
///
/// Cancelled bookings are kept for history; only active ones hold a seat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub seat_number: u32,
    pub status: BookingStatus,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn new(user_id: Uuid, session_id: Uuid, seat_number: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            session_id,
            seat_number,
            status: BookingStatus::Active,
            idempotency_key: None,
            created_at: Utc::now(),
            cancelled_at: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: Option<String>) -> Self {
        self.idempotency_key = key;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Active
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

/// A proposed seat reservation awaiting admission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub seat_number: u32,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl NewBooking {
    pub fn new(user_id: Uuid, session_id: Uuid, seat_number: u32) -> Self {
        Self {
            user_id,
            session_id,
            seat_number,
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Whether a stored booking is the result of this same request
    pub fn matches(&self, booking: &Booking) -> bool {
        booking.user_id == self.user_id
            && booking.session_id == self.session_id
            && booking.seat_number == self.seat_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_booking_is_active() {
        let user_id = Uuid::new_v4();
        let booking = Booking::new(user_id, Uuid::new_v4(), 12);
        assert!(booking.is_active());
        assert!(booking.is_owned_by(user_id));
        assert!(booking.cancelled_at.is_none());
    }

    #[test]
    fn test_request_matching() {
        let request = NewBooking::new(Uuid::new_v4(), Uuid::new_v4(), 4);
        let same = Booking::new(request.user_id, request.session_id, 4);
        let other_seat = Booking::new(request.user_id, request.session_id, 5);
        assert!(request.matches(&same));
        assert!(!request.matches(&other_seat));
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(BookingStatus::Active.to_string(), "active");
        assert_eq!(BookingStatus::Cancelled.as_str(), "cancelled");
    }
}
