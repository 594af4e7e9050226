//! Booking storage operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{
    format_datetime, parse_datetime, parse_datetime_opt, parse_status, parse_uuid, OptionalExt,
};
use crate::error::Result;
use crate::models::{Booking, BookingStatus};

const BOOKING_COLUMNS: &str =
    "id, user_id, session_id, seat_number, status, idempotency_key, created_at, cancelled_at";

fn booking_from_row(row: &Row<'_>) -> rusqlite::Result<Booking> {
    Ok(Booking {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        user_id: parse_uuid(&row.get::<_, String>(1)?)?,
        session_id: parse_uuid(&row.get::<_, String>(2)?)?,
        seat_number: row.get(3)?,
        status: parse_status(&row.get::<_, String>(4)?)?,
        idempotency_key: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?)?,
        cancelled_at: parse_datetime_opt(row.get::<_, Option<String>>(7)?)?,
    })
}

pub struct BookingStore<'a> {
    conn: &'a Connection,
}

impl<'a> BookingStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Persist an admitted booking
    #[instrument(skip(self, booking), fields(booking_id = %booking.id, session_id = %booking.session_id, seat = booking.seat_number))]
    pub fn create(&self, booking: &Booking) -> Result<()> {
        self.conn.execute(
            "INSERT INTO bookings (id, user_id, session_id, seat_number, status, idempotency_key, created_at, cancelled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                booking.id.to_string(),
                booking.user_id.to_string(),
                booking.session_id.to_string(),
                booking.seat_number,
                booking.status.as_str(),
                booking.idempotency_key,
                format_datetime(&booking.created_at),
                booking.cancelled_at.as_ref().map(format_datetime),
            ],
        )?;
        Ok(())
    }

    /// Find booking by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"))?;

        let booking = stmt
            .query_row(params![id.to_string()], booking_from_row)
            .optional()?;

        Ok(booking)
    }

    /// Find booking by idempotency key
    #[instrument(skip(self))]
    pub fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Booking>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE idempotency_key = ?1"
        ))?;

        let booking = stmt.query_row(params![key], booking_from_row).optional()?;

        Ok(booking)
    }

    /// Conditionally flip an active booking to cancelled
    #[instrument(skip(self))]
    pub fn cancel(&self, id: Uuid, cancelled_at: DateTime<Utc>) -> Result<bool> {
        let count = self.conn.execute(
            "UPDATE bookings SET status = ?1, cancelled_at = ?2 WHERE id = ?3 AND status = ?4",
            params![
                BookingStatus::Cancelled.as_str(),
                format_datetime(&cancelled_at),
                id.to_string(),
                BookingStatus::Active.as_str(),
            ],
        )?;
        Ok(count == 1)
    }

    /// Bookings made by a user, newest first
    #[instrument(skip(self))]
    pub fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = ?1 ORDER BY created_at DESC"
        ))?;

        let bookings = stmt
            .query_map(params![user_id.to_string()], booking_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(bookings)
    }

    /// All bookings, newest first
    pub fn list(&self) -> Result<Vec<Booking>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY created_at DESC"
        ))?;

        let bookings = stmt
            .query_map([], booking_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(bookings)
    }

    /// Active bookings only
    pub fn list_active(&self) -> Result<Vec<Booking>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = ?1 ORDER BY session_id, seat_number"
        ))?;

        let bookings = stmt
            .query_map(params![BookingStatus::Active.as_str()], booking_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(bookings)
    }
}
