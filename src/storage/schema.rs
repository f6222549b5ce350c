//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the vetting database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track verification runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    detail TEXT
);

-- One row per calendar day; a missing row means no calls that day
CREATE TABLE IF NOT EXISTS daily_quota (
    date TEXT PRIMARY KEY,
    calls_used INTEGER NOT NULL DEFAULT 0
);

-- Single-row fixed-bucket rate window
CREATE TABLE IF NOT EXISTS rate_window (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    last_call_at INTEGER,
    minute_bucket INTEGER NOT NULL DEFAULT 0,
    calls_this_minute INTEGER NOT NULL DEFAULT 0,
    second_bucket INTEGER NOT NULL DEFAULT 0,
    calls_this_second INTEGER NOT NULL DEFAULT 0
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
