//! Box Office Core Library
//!
//! Models, storage, and the admission engine that keeps hall schedules free
//! of overlapping sessions and seats free of double bookings.

pub mod engine;
pub mod error;
pub mod invariants;
pub mod models;
pub mod storage;

pub use engine::{BookingEngine, EngineConfig, RecoveryReport};
pub use error::{EntityKind, Error, Result};
pub use models::*;
pub use storage::{
    BookingRepository, CatalogRepository, Database, FilmLookup, HallLookup, SessionLookup,
    SessionRepository, Storage,
};
