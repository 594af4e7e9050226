//! Storage repository traits
//!
//! These traits define what the booking engine needs from persistence,
//! allowing for different implementations (SQLite, test doubles).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Booking, Film, Hall, Session};

/// Film lookup consumed by session admission
pub trait FilmLookup {
    /// Find film by ID
    fn find_film(&self, id: Uuid) -> Result<Option<Film>>;

    /// Check whether a film exists
    fn film_exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.find_film(id)?.is_some())
    }
}

/// Hall lookup consumed by both admissions
pub trait HallLookup {
    /// Find hall by ID
    fn find_hall(&self, id: Uuid) -> Result<Option<Hall>>;
}

/// Session lookup consumed by booking admission
pub trait SessionLookup {
    /// Find session by ID
    fn find_session(&self, id: Uuid) -> Result<Option<Session>>;
}

/// Film and hall catalog operations
pub trait CatalogRepository: FilmLookup + HallLookup {
    /// Create a new film
    fn create_film(&self, film: &Film) -> Result<()>;

    /// List films, highest rated first
    fn list_films(&self) -> Result<Vec<Film>>;

    /// Delete a film; returns whether it existed
    fn delete_film(&self, id: Uuid) -> Result<bool>;

    /// Create a new hall
    fn create_hall(&self, hall: &Hall) -> Result<()>;

    /// List halls by name
    fn list_halls(&self) -> Result<Vec<Hall>>;

    /// Delete a hall; returns whether it existed
    fn delete_hall(&self, id: Uuid) -> Result<bool>;
}

/// Session persistence
pub trait SessionRepository: SessionLookup {
    /// Persist an admitted session
    fn create_session(&self, session: &Session) -> Result<()>;

    /// Find the session created under an idempotency key
    fn find_session_by_idempotency_key(&self, key: &str) -> Result<Option<Session>>;

    /// Sessions in a hall overlapping `[from, to)`, ordered by start
    fn list_sessions_for_hall(
        &self,
        hall_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Session>>;

    /// Sessions showing a film, ordered by start
    fn list_sessions_for_film(&self, film_id: Uuid) -> Result<Vec<Session>>;

    /// Every persisted session (used for recovery)
    fn list_sessions(&self) -> Result<Vec<Session>>;

    /// Number of sessions scheduled in a hall
    fn count_sessions_for_hall(&self, hall_id: Uuid) -> Result<u64>;

    /// Number of sessions showing a film
    fn count_sessions_for_film(&self, film_id: Uuid) -> Result<u64>;
}

/// Booking persistence
pub trait BookingRepository {
    /// Persist an admitted booking
    fn create_booking(&self, booking: &Booking) -> Result<()>;

    /// Find booking by ID
    fn find_booking(&self, id: Uuid) -> Result<Option<Booking>>;

    /// Find the booking created under an idempotency key
    fn find_booking_by_idempotency_key(&self, key: &str) -> Result<Option<Booking>>;

    /// Flip an active booking to cancelled
    ///
    /// Returns `false` when the booking was not active, so concurrent
    /// cancellations transition it exactly once.
    fn cancel_booking(&self, id: Uuid, cancelled_at: DateTime<Utc>) -> Result<bool>;

    /// Bookings made by a user, newest first
    fn list_bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>>;

    /// All bookings, newest first
    fn list_bookings(&self) -> Result<Vec<Booking>>;

    /// Active bookings (used for recovery)
    fn list_active_bookings(&self) -> Result<Vec<Booking>>;
}

/// Combined storage interface
///
/// Provides everything the booking engine consumes.
pub trait Storage: CatalogRepository + SessionRepository + BookingRepository {}

// Blanket implementation: any type implementing all traits implements Storage
impl<T> Storage for T where T: CatalogRepository + SessionRepository + BookingRepository {}
