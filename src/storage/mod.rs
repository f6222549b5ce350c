//! Storage module for durable governor state
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - The date-keyed daily quota counter
//! - The fixed-bucket rate window record
//! - Run tracking with terminal status

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::VetError;
use serde::Serialize;
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
pub fn open_storage(path: &Path) -> Result<SqliteStorage, VetError> {
    SqliteStorage::new(path)
}

/// Persisted rate window: a minute bucket and a second bucket
///
/// Bucket ids are truncated Unix timestamps (`secs / 60` and `secs`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateWindowRecord {
    /// Unix milliseconds of the last recorded call
    pub last_call_at: Option<i64>,
    pub minute_bucket: i64,
    pub calls_this_minute: u32,
    pub second_bucket: i64,
    pub calls_this_second: u32,
}

impl RateWindowRecord {
    /// Calls counted in the minute bucket `bucket`, zero once it has rolled over
    pub fn calls_in_minute(&self, bucket: i64) -> u32 {
        if self.minute_bucket == bucket {
            self.calls_this_minute
        } else {
            0
        }
    }

    /// Calls counted in the second bucket `bucket`, zero once it has rolled over
    pub fn calls_in_second(&self, bucket: i64) -> u32 {
        if self.second_bucket == bucket {
            self.calls_this_second
        } else {
            0
        }
    }

    /// Returns the window after one more call at `now_ms`
    pub fn with_call_at(&self, now_ms: i64) -> Self {
        let second = now_ms.div_euclid(1000);
        let minute = second.div_euclid(60);

        Self {
            last_call_at: Some(now_ms),
            minute_bucket: minute,
            calls_this_minute: self.calls_in_minute(minute) + 1,
            second_bucket: second,
            calls_this_second: self.calls_in_second(second) + 1,
        }
    }
}

/// Represents a verification run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub detail: Option<String>,
}

/// Status of a verification run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Running,
    Completed,
    EarlyTerminated,
    QuotaExceeded,
    RateLimited,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::EarlyTerminated => "early-terminated",
            Self::QuotaExceeded => "quota-exceeded",
            Self::RateLimited => "rate-limited",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "early-terminated" => Some(Self::EarlyTerminated),
            "quota-exceeded" => Some(Self::QuotaExceeded),
            "rate-limited" => Some(Self::RateLimited),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_db_string())
    }
}
