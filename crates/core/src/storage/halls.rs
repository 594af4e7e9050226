//! Hall storage operations

use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{format_datetime, parse_datetime, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::Hall;

const HALL_COLUMNS: &str = "id, name, capacity, created_at";

fn hall_from_row(row: &Row<'_>) -> rusqlite::Result<Hall> {
    Ok(Hall {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        name: row.get(1)?,
        capacity: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?)?,
    })
}

pub struct HallStore<'a> {
    conn: &'a Connection,
}

impl<'a> HallStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new Hall
    #[instrument(skip(self, hall), fields(hall_id = %hall.id, capacity = hall.capacity))]
    pub fn create(&self, hall: &Hall) -> Result<()> {
        self.conn.execute(
            "INSERT INTO halls (id, name, capacity, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                hall.id.to_string(),
                hall.name,
                hall.capacity,
                format_datetime(&hall.created_at),
            ],
        )?;
        Ok(())
    }

    /// Find Hall by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Hall>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {HALL_COLUMNS} FROM halls WHERE id = ?1"))?;

        let hall = stmt
            .query_row(params![id.to_string()], hall_from_row)
            .optional()?;

        Ok(hall)
    }

    /// List all Halls by name
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<Hall>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {HALL_COLUMNS} FROM halls ORDER BY name"))?;

        let halls = stmt
            .query_map([], hall_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(halls)
    }

    /// Delete Hall; returns whether a row was removed
    #[instrument(skip(self))]
    pub fn delete(&self, hall_id: Uuid) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM halls WHERE id = ?1", params![hall_id.to_string()])?;
        Ok(count > 0)
    }
}
