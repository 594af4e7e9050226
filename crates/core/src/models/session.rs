//! Session model - one screening of a film in a hall

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Film, TimeRange};
use crate::error::{Error, Result};

/// A committed screening
///
/// The id doubles as the id of the interval committed for this session
/// in the hall's interval store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub film_id: Uuid,
    pub hall_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub price: f64,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn range(&self) -> Result<TimeRange> {
        TimeRange::new(self.start, self.end)
    }
}

/// How a proposed session's end time is determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEnd {
    /// Use the film's running time
    FilmRuntime,
    /// Explicit running time in minutes
    DurationMinutes { minutes: u32 },
    /// Explicit end timestamp
    At { end: DateTime<Utc> },
}

/// A proposed session awaiting admission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSession {
    pub film_id: Uuid,
    pub hall_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: SessionEnd,
    pub price: f64,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl NewSession {
    pub fn new(film_id: Uuid, hall_id: Uuid, start: DateTime<Utc>, end: SessionEnd, price: f64) -> Self {
        Self {
            film_id,
            hall_id,
            start,
            end,
            price,
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Resolve the `[start, end)` interval this session would occupy
    pub fn resolve_range(&self, film: &Film) -> Result<TimeRange> {
        match self.end {
            SessionEnd::FilmRuntime => TimeRange::starting_at(self.start, film.duration_minutes),
            SessionEnd::DurationMinutes { minutes } => TimeRange::starting_at(self.start, minutes),
            SessionEnd::At { end } => TimeRange::new(self.start, end),
        }
    }

    pub fn validate_price(&self) -> Result<()> {
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(Error::Validation(format!(
                "price must be a non-negative amount, got {}",
                self.price
            )));
        }
        Ok(())
    }

    /// Whether a stored session is the result of this same request
    ///
    /// `range` is this request's resolved interval, so it compares at the
    /// precision the stored session was written with.
    pub fn matches(&self, range: TimeRange, session: &Session) -> bool {
        session.film_id == self.film_id
            && session.hall_id == self.hall_id
            && session.start == range.start()
            && session.end == range.end()
            && session.price == self.price
    }

    /// Materialize the session for a committed interval
    pub fn into_session(self, id: Uuid, range: TimeRange) -> Session {
        Session {
            id,
            film_id: self.film_id,
            hall_id: self.hall_id,
            start: range.start(),
            end: range.end(),
            price: self.price,
            idempotency_key: self.idempotency_key,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn film(minutes: u32) -> Film {
        Film::new("Heat".to_string(), "Crime".to_string(), minutes)
    }

    fn six_pm() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 18, 0, 0).unwrap()
    }

    #[test]
    fn test_end_from_film_runtime() {
        let proposal = NewSession::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            six_pm(),
            SessionEnd::FilmRuntime,
            10.0,
        );
        let range = proposal.resolve_range(&film(170)).unwrap();
        assert_eq!(range.end(), Utc.with_ymd_and_hms(2024, 1, 1, 20, 50, 0).unwrap());
    }

    #[test]
    fn test_explicit_end_wins_over_runtime() {
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 20, 0, 0).unwrap();
        let proposal = NewSession::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            six_pm(),
            SessionEnd::At { end },
            10.0,
        );
        assert_eq!(proposal.resolve_range(&film(300)).unwrap().end(), end);
    }

    #[test]
    fn test_end_before_start_rejected() {
        let proposal = NewSession::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            six_pm(),
            SessionEnd::At {
                end: Utc.with_ymd_and_hms(2024, 1, 1, 17, 0, 0).unwrap(),
            },
            10.0,
        );
        assert!(matches!(
            proposal.resolve_range(&film(90)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_matches_compares_resolved_range_and_price() {
        let proposal = NewSession::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            six_pm() + chrono::Duration::nanoseconds(1_500),
            SessionEnd::FilmRuntime,
            10.0,
        );
        let range = proposal.resolve_range(&film(90)).unwrap();
        let stored = proposal.clone().into_session(Uuid::new_v4(), range);
        assert!(proposal.matches(range, &stored));

        let longer = proposal.resolve_range(&film(120)).unwrap();
        assert!(!proposal.matches(longer, &stored));

        let mut cheaper = proposal.clone();
        cheaper.price = 8.0;
        assert!(!cheaper.matches(range, &stored));
    }

    #[test]
    fn test_price_validation() {
        let mut proposal = NewSession::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            six_pm(),
            SessionEnd::FilmRuntime,
            0.0,
        );
        assert!(proposal.validate_price().is_ok());

        proposal.price = -1.0;
        assert!(proposal.validate_price().is_err());

        proposal.price = f64::NAN;
        assert!(proposal.validate_price().is_err());
    }
}
