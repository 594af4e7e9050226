//! Session admission and hall schedule queries

use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::intervals::{IntervalError, IntervalId};
use super::BookingEngine;
use crate::error::{EntityKind, Error, Result};
use crate::invariants::assert_sessions_disjoint;
use crate::models::{NewSession, Session};
use crate::storage::{is_unique_violation, Storage};

impl<S: Storage> BookingEngine<S> {
    /// Admit a session iff its hall has no overlapping session
    ///
    /// With an idempotency key, a retry of a completed admission returns the
    /// session created the first time.
    #[instrument(skip(self, request), fields(hall_id = %request.hall_id, film_id = %request.film_id, start = %request.start))]
    pub fn admit_session(&self, request: NewSession) -> Result<Session> {
        let key = request.idempotency_key.clone();
        self.in_flight
            .run_exclusive(key.map(|k| format!("session:{k}")), || {
                if let Some(existing) = self.replayed_session(&request)? {
                    return Ok(existing);
                }
                self.commit_session(request)
            })
    }

    fn replayed_session(&self, request: &NewSession) -> Result<Option<Session>> {
        let Some(key) = request.idempotency_key.as_deref() else {
            return Ok(None);
        };
        let Some(session) = self.storage.find_session_by_idempotency_key(key)? else {
            return Ok(None);
        };
        let same_request = match self.storage.find_film(request.film_id)? {
            Some(film) => request
                .resolve_range(&film)
                .is_ok_and(|range| request.matches(range, &session)),
            None => false,
        };
        if !same_request {
            return Err(Error::Validation(format!(
                "idempotency key '{key}' was already used for a different session"
            )));
        }
        info!(session_id = %session.id, "Replaying session admission");
        Ok(Some(session))
    }

    fn commit_session(&self, request: NewSession) -> Result<Session> {
        let film = self
            .storage
            .find_film(request.film_id)?
            .ok_or_else(|| Error::not_found(EntityKind::Film, request.film_id))?;
        let hall_id = request.hall_id;
        if self.storage.find_hall(hall_id)?.is_none() {
            return Err(Error::not_found(EntityKind::Hall, hall_id));
        }

        let range = request.resolve_range(&film)?;
        request.validate_price()?;

        let interval_id = match self.intervals.try_commit(hall_id, range) {
            Ok(id) => id,
            Err(IntervalError::Conflict { conflicting }) => {
                warn!(conflicting = %conflicting, range = %range, "Session conflicts with committed session");
                return Err(Error::SessionConflict {
                    hall_id,
                    start: range.start(),
                    end: range.end(),
                    conflicting_session_id: conflicting.0,
                });
            }
            Err(IntervalError::Unavailable(e)) => return Err(e.into()),
        };

        let session = request.into_session(interval_id.0, range);
        if let Err(e) = self.storage.create_session(&session) {
            self.roll_back_interval(hall_id, interval_id);
            return Err(match e {
                Error::Database(ref db) if is_unique_violation(db) => Error::Indeterminate(
                    "a session with this idempotency key was persisted concurrently".into(),
                ),
                other => other,
            });
        }

        if cfg!(debug_assertions) {
            if let Ok(committed) = self.intervals.committed(hall_id) {
                assert_sessions_disjoint(hall_id, &committed);
            }
        }

        info!(session_id = %session.id, range = %range, "Session admitted");
        Ok(session)
    }

    fn roll_back_interval(&self, hall_id: Uuid, interval_id: IntervalId) {
        match self.intervals.release(hall_id, interval_id) {
            Ok(_) => warn!(interval_id = %interval_id, "Session not persisted; interval released"),
            Err(e) => error!(interval_id = %interval_id, error = %e, "Failed to release interval after persist failure"),
        }
    }

    /// Sessions of a hall overlapping `[from, to)`, ordered by start
    #[instrument(skip(self))]
    pub fn list_sessions_in_range(
        &self,
        hall_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Session>> {
        if to <= from {
            return Err(Error::Validation("range end must be after its start".into()));
        }
        if self.storage.find_hall(hall_id)?.is_none() {
            return Err(Error::not_found(EntityKind::Hall, hall_id));
        }
        self.storage.list_sessions_for_hall(hall_id, from, to)
    }

    /// Sessions showing a film across every hall, ordered by start
    #[instrument(skip(self))]
    pub fn list_sessions_for_film(&self, film_id: Uuid) -> Result<Vec<Session>> {
        if !self.storage.film_exists(film_id)? {
            return Err(Error::not_found(EntityKind::Film, film_id));
        }
        self.storage.list_sessions_for_film(film_id)
    }

    pub fn find_session(&self, session_id: Uuid) -> Result<Session> {
        self.storage
            .find_session(session_id)?
            .ok_or_else(|| Error::not_found(EntityKind::Session, session_id))
    }
}
