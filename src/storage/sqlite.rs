//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RateWindowRecord, RunRecord, RunStatus};
use crate::VetError;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(VetError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, VetError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, VetError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<(RunRecord, String)> {
    let status: String = row.get(4)?;
    Ok((
        RunRecord {
            id: row.get(0)?,
            started_at: row.get(1)?,
            finished_at: row.get(2)?,
            config_hash: row.get(3)?,
            status: RunStatus::Running,
            detail: row.get(5)?,
        },
        status,
    ))
}

fn resolve_status((mut run, status): (RunRecord, String)) -> StorageResult<RunRecord> {
    run.status = RunStatus::from_db_string(&status)
        .ok_or_else(|| StorageError::InvalidValue(format!("run status '{}'", status)))?;
    Ok(run)
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status, detail FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?
            .map(resolve_status)
            .transpose()
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        detail: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, detail = ?3 WHERE id = ?4",
            params![status.to_db_string(), now, detail, run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Governor State =====

    fn calls_used_on(&self, date: NaiveDate) -> StorageResult<u32> {
        let used: Option<u32> = self
            .conn
            .query_row(
                "SELECT calls_used FROM daily_quota WHERE date = ?1",
                params![date_key(date)],
                |row| row.get(0),
            )
            .optional()?;

        Ok(used.unwrap_or(0))
    }

    fn set_calls_used(&mut self, date: NaiveDate, calls: u32) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO daily_quota (date, calls_used) VALUES (?1, ?2)
             ON CONFLICT(date) DO UPDATE SET calls_used = excluded.calls_used",
            params![date_key(date), calls],
        )?;
        Ok(())
    }

    fn load_rate_window(&self) -> StorageResult<RateWindowRecord> {
        let window = self
            .conn
            .query_row(
                "SELECT last_call_at, minute_bucket, calls_this_minute, second_bucket, calls_this_second
                 FROM rate_window WHERE id = 1",
                [],
                |row| {
                    Ok(RateWindowRecord {
                        last_call_at: row.get(0)?,
                        minute_bucket: row.get(1)?,
                        calls_this_minute: row.get(2)?,
                        second_bucket: row.get(3)?,
                        calls_this_second: row.get(4)?,
                    })
                },
            )
            .optional()?;

        Ok(window.unwrap_or_default())
    }

    fn record_call(&mut self, date: NaiveDate, window: &RateWindowRecord) -> StorageResult<u32> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO daily_quota (date, calls_used) VALUES (?1, 1)
             ON CONFLICT(date) DO UPDATE SET calls_used = calls_used + 1",
            params![date_key(date)],
        )?;

        tx.execute(
            "INSERT INTO rate_window (id, last_call_at, minute_bucket, calls_this_minute, second_bucket, calls_this_second)
             VALUES (1, ?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                last_call_at = excluded.last_call_at,
                minute_bucket = excluded.minute_bucket,
                calls_this_minute = excluded.calls_this_minute,
                second_bucket = excluded.second_bucket,
                calls_this_second = excluded.calls_this_second",
            params![
                window.last_call_at,
                window.minute_bucket,
                window.calls_this_minute,
                window.second_bucket,
                window.calls_this_second
            ],
        )?;

        let used: u32 = tx.query_row(
            "SELECT calls_used FROM daily_quota WHERE date = ?1",
            params![date_key(date)],
            |row| row.get(0),
        )?;

        tx.commit()?;
        Ok(used)
    }
}
