//! Session storage operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{format_datetime, parse_datetime, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::Session;

const SESSION_COLUMNS: &str =
    "id, film_id, hall_id, start_time, end_time, price, idempotency_key, created_at";

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        film_id: parse_uuid(&row.get::<_, String>(1)?)?,
        hall_id: parse_uuid(&row.get::<_, String>(2)?)?,
        start: parse_datetime(&row.get::<_, String>(3)?)?,
        end: parse_datetime(&row.get::<_, String>(4)?)?,
        price: row.get(5)?,
        idempotency_key: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?)?,
    })
}

pub struct SessionStore<'a> {
    conn: &'a Connection,
}

impl<'a> SessionStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Persist an admitted session
    #[instrument(skip(self, session), fields(session_id = %session.id, hall_id = %session.hall_id))]
    pub fn create(&self, session: &Session) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sessions (id, film_id, hall_id, start_time, end_time, price, idempotency_key, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                session.id.to_string(),
                session.film_id.to_string(),
                session.hall_id.to_string(),
                format_datetime(&session.start),
                format_datetime(&session.end),
                session.price,
                session.idempotency_key,
                format_datetime(&session.created_at),
            ],
        )?;
        Ok(())
    }

    /// Find session by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Session>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"))?;

        let session = stmt
            .query_row(params![id.to_string()], session_from_row)
            .optional()?;

        Ok(session)
    }

    /// Find session by idempotency key
    #[instrument(skip(self))]
    pub fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Session>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE idempotency_key = ?1"
        ))?;

        let session = stmt.query_row(params![key], session_from_row).optional()?;

        Ok(session)
    }

    /// Sessions in a hall overlapping `[from, to)`, ordered by start
    #[instrument(skip(self))]
    pub fn list_for_hall(
        &self,
        hall_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Session>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE hall_id = ?1 AND start_time < ?3 AND end_time > ?2
             ORDER BY start_time"
        ))?;

        let sessions = stmt
            .query_map(
                params![hall_id.to_string(), format_datetime(&from), format_datetime(&to)],
                session_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    /// Sessions showing a film across all halls, ordered by start
    #[instrument(skip(self))]
    pub fn list_for_film(&self, film_id: Uuid) -> Result<Vec<Session>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE film_id = ?1 ORDER BY start_time, hall_id"
        ))?;

        let sessions = stmt
            .query_map(params![film_id.to_string()], session_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    /// All sessions, ordered by hall and start
    pub fn list(&self) -> Result<Vec<Session>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY hall_id, start_time"
        ))?;

        let sessions = stmt
            .query_map([], session_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    /// Count sessions in a hall
    pub fn count_for_hall(&self, hall_id: Uuid) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE hall_id = ?1",
            params![hall_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Count sessions showing a film
    pub fn count_for_film(&self, film_id: Uuid) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE film_id = ?1",
            params![film_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
