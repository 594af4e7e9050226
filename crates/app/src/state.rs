//! Application state management

use std::sync::Arc;

use boxoffice_core::{BookingEngine, Database};
use tracing::info;

use crate::config::Config;
use crate::error::Result;

/// Main application state
pub struct AppState {
    engine: Arc<BookingEngine<Database>>,
}

impl AppState {
    /// Open the database and rebuild the engine's in-memory state from it
    pub fn new(config: &Config) -> Result<Self> {
        let db = Database::open(&config.database_path)?;
        info!(
            path = %config.database_path.display(),
            schema_version = db.schema_version()?,
            "Database opened"
        );

        let engine = BookingEngine::open(db, config.engine_config())?;
        Ok(Self {
            engine: Arc::new(engine),
        })
    }

    pub fn engine(&self) -> Arc<BookingEngine<Database>> {
        self.engine.clone()
    }
}
