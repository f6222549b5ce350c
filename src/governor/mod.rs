//! Quota/rate governor for the search calls
//!
//! Admission is a read-only decision; recording a call is the only mutation.
//! Callers check admission, attempt the call, then record it whether or not the
//! call succeeded.
//!
//! # Limits
//!
//! - **Daily quota**: `used + required <= daily_limit`, keyed by local calendar date
//! - **Per minute / per second**: fixed buckets that reset when the clock enters a
//!   new bucket id, not rolling windows
//!
//! A full rate bucket yields a wait in soft mode and a denial in strict mode.
//! An exhausted quota is always a denial.

mod clock;
mod usage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use usage::{Usage, UsageLevel, CRITICAL_PERCENT};

use crate::config::GovernorConfig;
use crate::storage::{SqliteStorage, Storage, StorageError};
use crate::VetError;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Which fixed bucket is full
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateWindow {
    Minute,
    Second,
}

/// Why a call was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    QuotaExhausted { used: u32, requested: u32, limit: u32 },
    RateLimited { window: RateWindow },
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuotaExhausted {
                used,
                requested,
                limit,
            } => write!(
                f,
                "daily quota exhausted: {} used + {} requested > {}",
                used, requested, limit
            ),
            Self::RateLimited { window } => write!(f, "per-{:?} rate limit reached", window),
        }
    }
}

/// Result of an admission check
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// Proceed now
    Granted { usage: Usage },

    /// Proceed after `wait` (soft mode, rate bucket full)
    Throttled { wait: Duration, usage: Usage },

    /// Do not proceed; `retry_after` is zero for an exhausted quota
    Denied {
        reason: DenialReason,
        retry_after: Duration,
        usage: Usage,
    },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Denied { .. })
    }

    /// Advised wait before the call; zero when granted outright
    pub fn wait(&self) -> Duration {
        match self {
            Self::Granted { .. } => Duration::ZERO,
            Self::Throttled { wait, .. } => *wait,
            Self::Denied { retry_after, .. } => *retry_after,
        }
    }

    pub fn reason(&self) -> Option<DenialReason> {
        match self {
            Self::Denied { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub fn usage(&self) -> Usage {
        match self {
            Self::Granted { usage } | Self::Throttled { usage, .. } | Self::Denied { usage, .. } => {
                *usage
            }
        }
    }
}

/// Process-wide governor over persisted quota and rate state
///
/// Every read-modify-write of the persisted counters happens under one lock.
#[derive(Debug, Clone)]
pub struct Governor {
    limits: GovernorConfig,
    storage: Arc<Mutex<SqliteStorage>>,
    clock: Arc<dyn Clock>,
}

impl Governor {
    pub fn new(limits: GovernorConfig, storage: Arc<Mutex<SqliteStorage>>) -> Self {
        Self::with_clock(limits, storage, Arc::new(SystemClock))
    }

    pub fn with_clock(
        limits: GovernorConfig,
        storage: Arc<Mutex<SqliteStorage>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            limits,
            storage,
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, SqliteStorage>, StorageError> {
        self.storage.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Today's usage
    pub fn usage(&self) -> Result<Usage, VetError> {
        let today = self.clock.now().date_naive();
        let used = self.lock()?.calls_used_on(today)?;
        Ok(Usage::new(
            used,
            self.limits.daily_limit,
            self.limits.warning_threshold,
        ))
    }

    /// Decides whether `required` more calls may be made now
    ///
    /// Checks, in order: the daily quota, the usage level (logged only), then the
    /// second and minute buckets.
    pub fn check_admission(&self, required: u32) -> Result<Admission, VetError> {
        let now = self.clock.now();
        let (used, window) = {
            let storage = self.lock()?;
            (
                storage.calls_used_on(now.date_naive())?,
                storage.load_rate_window()?,
            )
        };

        let usage = Usage::new(
            used,
            self.limits.daily_limit,
            self.limits.warning_threshold,
        );

        if used.saturating_add(required) > self.limits.daily_limit {
            let reason = DenialReason::QuotaExhausted {
                used,
                requested: required,
                limit: self.limits.daily_limit,
            };
            tracing::error!(%usage, "Admission denied: {}", reason);
            return Ok(Admission::Denied {
                reason,
                retry_after: Duration::ZERO,
                usage,
            });
        }

        match usage.level {
            UsageLevel::Critical => tracing::warn!(%usage, "Search quota nearly exhausted"),
            UsageLevel::Warning => tracing::warn!(%usage, "Search quota above warning threshold"),
            UsageLevel::Normal => tracing::debug!(%usage, "Search quota usage"),
        }

        let now_ms = now.timestamp_millis();
        let second = now_ms.div_euclid(1000);
        let minute = second.div_euclid(60);

        let mut full = None;
        let mut wait = Duration::ZERO;

        if window.calls_in_second(second) >= self.limits.rate_limit_per_second {
            full = Some(RateWindow::Second);
            wait = wait.max(until_next_bucket(now_ms, 1_000));
        }
        if window.calls_in_minute(minute) >= self.limits.rate_limit_per_minute {
            full = Some(RateWindow::Minute);
            wait = wait.max(until_next_bucket(now_ms, 60_000));
        }

        let Some(window) = full else {
            return Ok(Admission::Granted { usage });
        };

        if self.limits.strict_mode {
            tracing::warn!(?window, ?wait, "Admission denied by rate limit");
            Ok(Admission::Denied {
                reason: DenialReason::RateLimited { window },
                retry_after: wait,
                usage,
            })
        } else {
            tracing::debug!(?window, ?wait, "Admission throttled");
            Ok(Admission::Throttled { wait, usage })
        }
    }

    /// Records one attempted call against the daily counter and both buckets
    ///
    /// # Returns
    ///
    /// The day's call count after this call
    pub fn record_call(&self) -> Result<u32, VetError> {
        let now = self.clock.now();
        let mut storage = self.lock()?;

        let window = storage.load_rate_window()?.with_call_at(now.timestamp_millis());
        let used = storage.record_call(now.date_naive(), &window)?;

        tracing::debug!(used, limit = self.limits.daily_limit, "Recorded search call");
        Ok(used)
    }

    /// Waits until `required` calls are admitted
    ///
    /// Soft-mode waits are slept and re-checked; `stop` interrupts them.
    ///
    /// # Errors
    ///
    /// * `VetError::QuotaExceeded` - the daily quota cannot cover `required`
    /// * `VetError::RateLimited` - strict mode and a rate bucket is full
    /// * `VetError::EarlyTerminated` - `stop` fired while waiting
    pub async fn admit(&self, required: u32, stop: &CancellationToken) -> Result<Usage, VetError> {
        loop {
            match self.check_admission(required)? {
                Admission::Granted { usage } => return Ok(usage),
                Admission::Throttled { wait, .. } => {
                    tracing::info!(?wait, "Rate limit reached, waiting");
                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {}
                        _ = stop.cancelled() => return Err(VetError::EarlyTerminated),
                    }
                }
                Admission::Denied {
                    reason: DenialReason::QuotaExhausted { used, requested, limit },
                    ..
                } => {
                    return Err(VetError::QuotaExceeded {
                        used,
                        requested,
                        limit,
                    })
                }
                Admission::Denied {
                    reason: DenialReason::RateLimited { .. },
                    retry_after,
                    ..
                } => return Err(VetError::RateLimited { retry_after }),
            }
        }
    }
}

/// Time from `now_ms` to the start of the next bucket of `bucket_ms`
fn until_next_bucket(now_ms: i64, bucket_ms: i64) -> Duration {
    let elapsed = now_ms.rem_euclid(bucket_ms);
    Duration::from_millis((bucket_ms - elapsed) as u64)
}
