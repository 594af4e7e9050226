//! SQLite storage layer for Box Office

mod bookings;
mod films;
mod halls;
mod migrations;
mod parse;
mod sessions;
mod traits;

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Booking, Film, Hall, Session};

pub use bookings::BookingStore;
pub use films::FilmStore;
pub use halls::HallStore;
pub use parse::{is_foreign_key_violation, is_unique_violation};
pub use sessions::SessionStore;
pub use traits::{
    BookingRepository, CatalogRepository, FilmLookup, HallLookup, SessionLookup,
    SessionRepository, Storage,
};

/// Main database handle
///
/// The connection sits behind its own mutex so the handle can be shared
/// across threads. It is never taken while an engine collision domain is
/// locked.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    /// Configure the connection and bring the schema up to date
    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` with exclusive use of the connection
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::Unavailable("database connection lock poisoned".into()))?;
        f(&conn)
    }

    /// Get current schema version
    pub fn schema_version(&self) -> Result<u32> {
        self.with_conn(|conn| {
            let version: Option<u32> = conn.query_row(
                "SELECT MAX(version) FROM schema_migrations",
                [],
                |row| row.get(0),
            )?;
            Ok(version.unwrap_or(0))
        })
    }
}

// Implement repository traits for Database
// This enables using Database through the trait interface

impl FilmLookup for Database {
    fn find_film(&self, id: Uuid) -> Result<Option<Film>> {
        self.with_conn(|conn| FilmStore::new(conn).find_by_id(id))
    }
}

impl HallLookup for Database {
    fn find_hall(&self, id: Uuid) -> Result<Option<Hall>> {
        self.with_conn(|conn| HallStore::new(conn).find_by_id(id))
    }
}

impl SessionLookup for Database {
    fn find_session(&self, id: Uuid) -> Result<Option<Session>> {
        self.with_conn(|conn| SessionStore::new(conn).find_by_id(id))
    }
}

impl CatalogRepository for Database {
    fn create_film(&self, film: &Film) -> Result<()> {
        self.with_conn(|conn| FilmStore::new(conn).create(film))
    }

    fn list_films(&self) -> Result<Vec<Film>> {
        self.with_conn(|conn| FilmStore::new(conn).list())
    }

    fn delete_film(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| FilmStore::new(conn).delete(id))
    }

    fn create_hall(&self, hall: &Hall) -> Result<()> {
        self.with_conn(|conn| HallStore::new(conn).create(hall))
    }

    fn list_halls(&self) -> Result<Vec<Hall>> {
        self.with_conn(|conn| HallStore::new(conn).list())
    }

    fn delete_hall(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| HallStore::new(conn).delete(id))
    }
}

impl SessionRepository for Database {
    fn create_session(&self, session: &Session) -> Result<()> {
        self.with_conn(|conn| SessionStore::new(conn).create(session))
    }

    fn find_session_by_idempotency_key(&self, key: &str) -> Result<Option<Session>> {
        self.with_conn(|conn| SessionStore::new(conn).find_by_idempotency_key(key))
    }

    fn list_sessions_for_hall(
        &self,
        hall_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Session>> {
        self.with_conn(|conn| SessionStore::new(conn).list_for_hall(hall_id, from, to))
    }

    fn list_sessions_for_film(&self, film_id: Uuid) -> Result<Vec<Session>> {
        self.with_conn(|conn| SessionStore::new(conn).list_for_film(film_id))
    }

    fn list_sessions(&self) -> Result<Vec<Session>> {
        self.with_conn(|conn| SessionStore::new(conn).list())
    }

    fn count_sessions_for_hall(&self, hall_id: Uuid) -> Result<u64> {
        self.with_conn(|conn| SessionStore::new(conn).count_for_hall(hall_id))
    }

    fn count_sessions_for_film(&self, film_id: Uuid) -> Result<u64> {
        self.with_conn(|conn| SessionStore::new(conn).count_for_film(film_id))
    }
}

impl BookingRepository for Database {
    fn create_booking(&self, booking: &Booking) -> Result<()> {
        self.with_conn(|conn| BookingStore::new(conn).create(booking))
    }

    fn find_booking(&self, id: Uuid) -> Result<Option<Booking>> {
        self.with_conn(|conn| BookingStore::new(conn).find_by_id(id))
    }

    fn find_booking_by_idempotency_key(&self, key: &str) -> Result<Option<Booking>> {
        self.with_conn(|conn| BookingStore::new(conn).find_by_idempotency_key(key))
    }

    fn cancel_booking(&self, id: Uuid, cancelled_at: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| BookingStore::new(conn).cancel(id, cancelled_at))
    }

    fn list_bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>> {
        self.with_conn(|conn| BookingStore::new(conn).list_for_user(user_id))
    }

    fn list_bookings(&self) -> Result<Vec<Booking>> {
        self.with_conn(|conn| BookingStore::new(conn).list())
    }

    fn list_active_bookings(&self) -> Result<Vec<Booking>> {
        self.with_conn(|conn| BookingStore::new(conn).list_active())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    fn seed(db: &Database) -> (Film, Hall) {
        let film = Film::new("Alien".to_string(), "Horror".to_string(), 117).with_rating(8.5);
        let hall = Hall::new("Blue".to_string(), 50);
        db.create_film(&film).unwrap();
        db.create_hall(&hall).unwrap();
        (film, hall)
    }

    fn session(film: &Film, hall: &Hall, start: u32, end: u32) -> Session {
        Session {
            id: Uuid::new_v4(),
            film_id: film.id,
            hall_id: hall.id,
            start: at(start),
            end: at(end),
            price: 10.0,
            idempotency_key: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_schema_version() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.schema_version().unwrap(), 2);
    }

    #[test]
    fn test_file_backed_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("boxoffice.db");

        let hall_id = {
            let db = Database::open(&path).unwrap();
            let (_, hall) = seed(&db);
            hall.id
        };

        let db = Database::open(&path).unwrap();
        assert_eq!(db.find_hall(hall_id).unwrap().unwrap().capacity, 50);
    }

    #[test]
    fn test_catalog_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let (film, hall) = seed(&db);

        assert_eq!(db.find_film(film.id).unwrap(), Some(film.clone()));
        assert!(db.film_exists(film.id).unwrap());
        assert!(!db.film_exists(Uuid::new_v4()).unwrap());
        assert_eq!(db.list_halls().unwrap(), vec![hall.clone()]);

        assert!(db.delete_film(film.id).unwrap());
        assert!(!db.delete_film(film.id).unwrap());
    }

    #[test]
    fn test_sessions_in_range_ordered() {
        let db = Database::open_in_memory().unwrap();
        let (film, hall) = seed(&db);

        let late = session(&film, &hall, 20, 22);
        let early = session(&film, &hall, 10, 12);
        let noon = session(&film, &hall, 12, 14);
        for s in [&late, &early, &noon] {
            db.create_session(s).unwrap();
        }

        let ids: Vec<_> = db
            .list_sessions_for_hall(hall.id, at(11), at(21))
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![early.id, noon.id, late.id]);

        // Touching the window boundary is outside it
        let ids: Vec<_> = db
            .list_sessions_for_hall(hall.id, at(12), at(20))
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![noon.id]);

        assert_eq!(db.count_sessions_for_hall(hall.id).unwrap(), 3);
        assert_eq!(db.count_sessions_for_film(film.id).unwrap(), 3);
    }

    #[test]
    fn test_sessions_for_film_across_halls() {
        let db = Database::open_in_memory().unwrap();
        let (film, hall) = seed(&db);
        let annex = Hall::new("Annex".to_string(), 20);
        db.create_hall(&annex).unwrap();
        let other = Film::new("Heat".to_string(), "Crime".to_string(), 170);
        db.create_film(&other).unwrap();

        let late = session(&film, &hall, 20, 22);
        let early = session(&film, &annex, 9, 11);
        db.create_session(&late).unwrap();
        db.create_session(&early).unwrap();
        db.create_session(&session(&other, &hall, 12, 15)).unwrap();

        let ids: Vec<_> = db
            .list_sessions_for_film(film.id)
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![early.id, late.id]);
        assert!(db.list_sessions_for_film(Uuid::new_v4()).unwrap().is_empty());
    }

    #[test]
    fn test_sub_second_timestamps_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let (film, hall) = seed(&db);
        let mut s = session(&film, &hall, 10, 12);
        s.start = s.start + chrono::Duration::microseconds(1_250);
        db.create_session(&s).unwrap();

        assert_eq!(db.find_session(s.id).unwrap().unwrap().start, s.start);
    }

    #[test]
    fn test_hall_with_sessions_cannot_be_deleted() {
        let db = Database::open_in_memory().unwrap();
        let (film, hall) = seed(&db);
        db.create_session(&session(&film, &hall, 10, 12)).unwrap();

        match db.delete_hall(hall.id) {
            Err(Error::Database(e)) => assert!(is_foreign_key_violation(&e)),
            other => panic!("expected foreign key violation, got {other:?}"),
        }
    }

    #[test]
    fn test_booking_cancel_is_conditional() {
        let db = Database::open_in_memory().unwrap();
        let (film, hall) = seed(&db);
        let s = session(&film, &hall, 10, 12);
        db.create_session(&s).unwrap();

        let booking = Booking::new(Uuid::new_v4(), s.id, 12).with_idempotency_key(Some("k".into()));
        db.create_booking(&booking).unwrap();
        assert_eq!(
            db.find_booking_by_idempotency_key("k").unwrap().map(|b| b.id),
            Some(booking.id)
        );

        assert!(db.cancel_booking(booking.id, Utc::now()).unwrap());
        assert!(!db.cancel_booking(booking.id, Utc::now()).unwrap());

        let stored = db.find_booking(booking.id).unwrap().unwrap();
        assert!(!stored.is_active());
        assert!(stored.cancelled_at.is_some());
        assert!(db.list_active_bookings().unwrap().is_empty());
        assert_eq!(db.list_bookings_for_user(booking.user_id).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_active_seat_is_unique_violation() {
        let db = Database::open_in_memory().unwrap();
        let (film, hall) = seed(&db);
        let s = session(&film, &hall, 10, 12);
        db.create_session(&s).unwrap();

        db.create_booking(&Booking::new(Uuid::new_v4(), s.id, 5)).unwrap();
        match db.create_booking(&Booking::new(Uuid::new_v4(), s.id, 5)) {
            Err(Error::Database(e)) => assert!(is_unique_violation(&e)),
            other => panic!("expected unique violation, got {other:?}"),
        }
    }
}
