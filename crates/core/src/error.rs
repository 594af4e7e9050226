//! Error types for Box Office Core

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Kind of entity a lookup failed to find
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Film,
    Hall,
    Session,
    Booking,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Film => "Film",
            EntityKind::Hall => "Hall",
            EntityKind::Session => "Session",
            EntityKind::Booking => "Booking",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: Uuid },

    #[error("Session [{start}, {end}) in hall {hall_id} overlaps session {conflicting_session_id}")]
    SessionConflict {
        hall_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        conflicting_session_id: Uuid,
    },

    #[error("Seat {seat_number} is already taken for session {session_id}")]
    SeatTaken { session_id: Uuid, seat_number: u32 },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The outcome of a request is unknown; reconcile before retrying
    #[error("Outcome indeterminate: {0}")]
    Indeterminate(String),

    /// The exclusion mechanism itself is unusable
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn not_found(kind: EntityKind, id: Uuid) -> Self {
        Error::NotFound { kind, id }
    }

    /// Legitimate contention; the caller may pick another slot or seat
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::SessionConflict { .. } | Error::SeatTaken { .. })
    }

    /// Storage-level failures the caller should retry with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Unavailable(_) | Error::Database(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let taken = Error::SeatTaken {
            session_id: Uuid::new_v4(),
            seat_number: 3,
        };
        assert!(taken.is_conflict());
        assert!(!taken.is_retryable());

        let unavailable = Error::Unavailable("lock poisoned".into());
        assert!(unavailable.is_retryable());
        assert!(!unavailable.is_conflict());

        let missing = Error::not_found(EntityKind::Hall, Uuid::nil());
        assert!(!missing.is_conflict());
        assert!(missing.to_string().starts_with("Hall not found"));
    }
}
