//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{RateWindowRecord, RunRecord, RunStatus};
use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for durable governor state and run history
///
/// Missing records read as zero usage, so a fresh or wiped database is valid.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new verification run in the `running` state
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Stores a run's terminal status and finish timestamp
    fn finish_run(&mut self, run_id: i64, status: RunStatus, detail: Option<&str>)
        -> StorageResult<()>;

    // ===== Governor State =====

    /// Calls recorded on `date`, zero when the day has no record
    fn calls_used_on(&self, date: NaiveDate) -> StorageResult<u32>;

    /// Overwrites the counter for `date`
    fn set_calls_used(&mut self, date: NaiveDate, calls: u32) -> StorageResult<()>;

    /// Loads the rate window, or an empty one when none was stored
    fn load_rate_window(&self) -> StorageResult<RateWindowRecord>;

    /// Increments the counter for `date` and stores `window` in one transaction
    ///
    /// # Returns
    ///
    /// The day's call count after the increment
    fn record_call(&mut self, date: NaiveDate, window: &RateWindowRecord) -> StorageResult<u32>;
}
