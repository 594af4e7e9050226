//! Network protocol message types
//!
//! All messages are JSON-serialized and length-prefixed on the wire.
//! Every request is answered by exactly one response.

use boxoffice_core::{Booking, Error as CoreError, Film, Hall, NewBooking, NewSession, Session};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Requests a client may send
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    AdmitSession(NewSession),

    AdmitBooking(NewBooking),

    /// Cancel one of the caller's bookings
    CancelBooking { booking_id: Uuid, user_id: Uuid },

    ListFreeSeats { session_id: Uuid },

    /// Sessions of a hall overlapping `[from, to)`
    ListSessions {
        hall_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },

    /// Sessions showing a film in any hall
    ListFilmSessions { film_id: Uuid },

    ListMyBookings { user_id: Uuid },

    ListBookings,

    CreateFilm {
        title: String,
        genre: String,
        duration_minutes: u32,
        #[serde(default)]
        rating: f64,
        #[serde(default)]
        description: String,
        #[serde(default)]
        image_url: Option<String>,
    },

    /// Films, highest rated first
    ListFilms,

    DeleteFilm { film_id: Uuid },

    CreateHall { name: String, capacity: u32 },

    ListHalls,

    DeleteHall { hall_id: Uuid },

    Ping,
}

impl Request {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Request::AdmitSession(_) => "admit_session",
            Request::AdmitBooking(_) => "admit_booking",
            Request::CancelBooking { .. } => "cancel_booking",
            Request::ListFreeSeats { .. } => "list_free_seats",
            Request::ListSessions { .. } => "list_sessions",
            Request::ListFilmSessions { .. } => "list_film_sessions",
            Request::ListMyBookings { .. } => "list_my_bookings",
            Request::ListBookings => "list_bookings",
            Request::CreateFilm { .. } => "create_film",
            Request::ListFilms => "list_films",
            Request::DeleteFilm { .. } => "delete_film",
            Request::CreateHall { .. } => "create_hall",
            Request::ListHalls => "list_halls",
            Request::DeleteHall { .. } => "delete_hall",
            Request::Ping => "ping",
        }
    }
}

/// Responses sent by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Session(Session),

    Sessions { sessions: Vec<Session> },

    Booking(Booking),

    Bookings { bookings: Vec<Booking> },

    FreeSeats { seats: Vec<u32> },

    Film(Film),

    Films { films: Vec<Film> },

    Hall(Hall),

    Halls { halls: Vec<Hall> },

    Deleted { id: Uuid },

    Pong,

    Error(ErrorBody),
}

/// Error category carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    SessionConflict,
    SeatTaken,
    InvalidState,
    PermissionDenied,
    /// Outcome unknown; reconcile (list bookings or sessions) before retrying
    Indeterminate,
    Unavailable,
    Internal,
}

impl ErrorKind {
    /// HTTP-style status code for this kind
    pub fn status(self) -> u16 {
        match self {
            ErrorKind::PermissionDenied => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::SessionConflict | ErrorKind::SeatTaken | ErrorKind::InvalidState => 409,
            ErrorKind::Validation => 422,
            ErrorKind::Internal => 500,
            ErrorKind::Indeterminate | ErrorKind::Unavailable => 503,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: u16,
    pub kind: ErrorKind,
    pub message: String,
    /// Set for `SessionConflict`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicting_session_id: Option<Uuid>,
}

impl ErrorBody {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: kind.status(),
            kind,
            message: message.into(),
            conflicting_session_id: None,
        }
    }
}

impl From<&CoreError> for ErrorBody {
    fn from(error: &CoreError) -> Self {
        let kind = match error {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::SessionConflict { .. } => ErrorKind::SessionConflict,
            CoreError::SeatTaken { .. } => ErrorKind::SeatTaken,
            CoreError::InvalidState(_) => ErrorKind::InvalidState,
            CoreError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            CoreError::Indeterminate(_) => ErrorKind::Indeterminate,
            CoreError::Unavailable(_) => ErrorKind::Unavailable,
            CoreError::Database(_) | CoreError::Io(_) => ErrorKind::Internal,
        };
        let mut body = ErrorBody::new(kind, error.to_string());
        if let CoreError::SessionConflict {
            conflicting_session_id,
            ..
        } = error
        {
            body.conflicting_session_id = Some(*conflicting_session_id);
        }
        body
    }
}

impl From<CoreError> for Response {
    fn from(error: CoreError) -> Self {
        Response::Error(ErrorBody::from(&error))
    }
}
