//! Film and hall catalog management

use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::BookingEngine;
use crate::error::{EntityKind, Error, Result};
use crate::invariants::assert_hall_invariants;
use crate::models::{Film, Hall};
use crate::storage::{is_foreign_key_violation, Storage};

impl<S: Storage> BookingEngine<S> {
    #[instrument(skip(self, film), fields(title = %film.title))]
    pub fn create_film(&self, film: Film) -> Result<Film> {
        if film.title.trim().is_empty() {
            return Err(Error::Validation("film title cannot be empty".into()));
        }
        if film.duration_minutes == 0 {
            return Err(Error::Validation("film duration must be positive".into()));
        }
        if !(0.0..=10.0).contains(&film.rating) {
            return Err(Error::Validation(format!(
                "film rating must be within 0..=10, got {}",
                film.rating
            )));
        }

        self.storage.create_film(&film)?;
        info!(film_id = %film.id, "Film created");
        Ok(film)
    }

    #[instrument(skip(self, hall), fields(name = %hall.name))]
    pub fn create_hall(&self, hall: Hall) -> Result<Hall> {
        if hall.name.trim().is_empty() {
            return Err(Error::Validation("hall name cannot be empty".into()));
        }
        if hall.capacity == 0 {
            return Err(Error::Validation("hall capacity must be positive".into()));
        }
        assert_hall_invariants(&hall);

        self.storage.create_hall(&hall)?;
        info!(hall_id = %hall.id, capacity = hall.capacity, "Hall created");
        Ok(hall)
    }

    pub fn list_films(&self) -> Result<Vec<Film>> {
        self.storage.list_films()
    }

    pub fn list_halls(&self) -> Result<Vec<Hall>> {
        self.storage.list_halls()
    }

    /// Delete a hall that has never had a session scheduled
    #[instrument(skip(self))]
    pub fn delete_hall(&self, hall_id: Uuid) -> Result<()> {
        if self.intervals.has_committed(hall_id)?
            || self.storage.count_sessions_for_hall(hall_id)? > 0
        {
            warn!("Refusing to delete hall with sessions");
            return Err(Error::InvalidState(format!(
                "hall {hall_id} has scheduled sessions"
            )));
        }

        match self.storage.delete_hall(hall_id) {
            Ok(true) => {
                info!("Hall deleted");
                Ok(())
            }
            Ok(false) => Err(Error::not_found(EntityKind::Hall, hall_id)),
            Err(Error::Database(e)) if is_foreign_key_violation(&e) => Err(Error::InvalidState(
                format!("hall {hall_id} has scheduled sessions"),
            )),
            Err(e) => Err(e),
        }
    }

    /// Delete a film no session shows
    #[instrument(skip(self))]
    pub fn delete_film(&self, film_id: Uuid) -> Result<()> {
        if self.storage.count_sessions_for_film(film_id)? > 0 {
            return Err(Error::InvalidState(format!(
                "film {film_id} is shown by scheduled sessions"
            )));
        }

        match self.storage.delete_film(film_id) {
            Ok(true) => {
                info!("Film deleted");
                Ok(())
            }
            Ok(false) => Err(Error::not_found(EntityKind::Film, film_id)),
            Err(Error::Database(e)) if is_foreign_key_violation(&e) => Err(Error::InvalidState(
                format!("film {film_id} is shown by scheduled sessions"),
            )),
            Err(e) => Err(e),
        }
    }
}
