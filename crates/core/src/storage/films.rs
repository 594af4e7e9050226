//! Film storage operations

use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::Film;

const FILM_COLUMNS: &str = "id, title, genre, duration_minutes, rating, description, image_url";

fn film_from_row(row: &Row<'_>) -> rusqlite::Result<Film> {
    Ok(Film {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        title: row.get(1)?,
        genre: row.get(2)?,
        duration_minutes: row.get(3)?,
        rating: row.get(4)?,
        description: row.get(5)?,
        image_url: row.get(6)?,
    })
}

pub struct FilmStore<'a> {
    conn: &'a Connection,
}

impl<'a> FilmStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new film
    #[instrument(skip(self, film), fields(film_id = %film.id, title = %film.title))]
    pub fn create(&self, film: &Film) -> Result<()> {
        self.conn.execute(
            "INSERT INTO films (id, title, genre, duration_minutes, rating, description, image_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                film.id.to_string(),
                film.title,
                film.genre,
                film.duration_minutes,
                film.rating,
                film.description,
                film.image_url,
            ],
        )?;
        Ok(())
    }

    /// Find film by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Film>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {FILM_COLUMNS} FROM films WHERE id = ?1"))?;

        let film = stmt
            .query_row(params![id.to_string()], film_from_row)
            .optional()?;

        Ok(film)
    }

    /// List films, highest rated first
    pub fn list(&self) -> Result<Vec<Film>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FILM_COLUMNS} FROM films ORDER BY rating DESC, title"
        ))?;

        let films = stmt
            .query_map([], film_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(films)
    }

    /// Delete film; returns whether a row was removed
    #[instrument(skip(self))]
    pub fn delete(&self, film_id: Uuid) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM films WHERE id = ?1", params![film_id.to_string()])?;
        Ok(count > 0)
    }
}
