//! Database migration system
//!
//! Tracks schema versions and applies migrations in order, one transaction each.

use rusqlite::Connection;
use tracing::{info, instrument};

use crate::error::Result;

/// A database migration
pub struct Migration {
    /// Version number (must be sequential starting from 1)
    pub version: u32,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to run for this migration
    pub sql: &'static str,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema",
        sql: r#"
            -- Films table
            CREATE TABLE IF NOT EXISTS films (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                genre TEXT NOT NULL,
                duration_minutes INTEGER NOT NULL CHECK (duration_minutes > 0),
                rating REAL NOT NULL DEFAULT 0,
                description TEXT NOT NULL DEFAULT '',
                image_url TEXT
            );

            -- Halls table
            CREATE TABLE IF NOT EXISTS halls (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                capacity INTEGER NOT NULL CHECK (capacity > 0),
                created_at TEXT NOT NULL
            );

            -- Sessions table (no cascade: halls and films with sessions cannot be deleted)
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                film_id TEXT NOT NULL,
                hall_id TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                price REAL NOT NULL CHECK (price >= 0),
                idempotency_key TEXT UNIQUE,
                created_at TEXT NOT NULL,
                FOREIGN KEY (film_id) REFERENCES films(id),
                FOREIGN KEY (hall_id) REFERENCES halls(id)
            );

            -- Bookings table (cancelled rows are kept for history)
            CREATE TABLE IF NOT EXISTS bookings (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                seat_number INTEGER NOT NULL CHECK (seat_number > 0),
                status TEXT NOT NULL DEFAULT 'active',
                idempotency_key TEXT UNIQUE,
                created_at TEXT NOT NULL,
                cancelled_at TEXT,
                FOREIGN KEY (session_id) REFERENCES sessions(id)
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Add indexes and the active seat uniqueness guard",
        sql: r#"
            -- Session indexes
            CREATE INDEX IF NOT EXISTS idx_sessions_hall_start ON sessions(hall_id, start_time);
            CREATE INDEX IF NOT EXISTS idx_sessions_film ON sessions(film_id);

            -- Booking indexes
            CREATE INDEX IF NOT EXISTS idx_bookings_user ON bookings(user_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_bookings_status ON bookings(status);

            -- At most one active booking per seat, even for writers outside the engine
            CREATE UNIQUE INDEX IF NOT EXISTS idx_bookings_active_seat
                ON bookings(session_id, seat_number) WHERE status = 'active';
        "#,
    },
];

/// Initialize the migrations table
fn init_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version
fn get_current_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> = conn
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .unwrap_or(None);
    Ok(version.unwrap_or(0))
}

/// Record that a migration was applied
fn record_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.description,
            chrono::Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Run all pending migrations
#[instrument(skip(conn))]
pub fn run_migrations(conn: &Connection) -> Result<()> {
    init_migrations_table(conn)?;

    let current_version = get_current_version(conn)?;
    info!(current_version, "Checking for pending migrations");

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                description = migration.description,
                "Applying migration"
            );

            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(migration.sql)?;
            record_migration(&tx, migration)?;
            tx.commit()?;

            info!(version = migration.version, "Migration complete");
        }
    }

    let new_version = get_current_version(conn)?;
    if new_version > current_version {
        info!(
            from = current_version,
            to = new_version,
            "Database schema updated"
        );
    }

    Ok(())
}
