use crate::cancel::EarlyTermination;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Lifecycle of one bounded unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Pending,
    Running,
    Completed,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum WatchdogError {
    #[error("{label} timed out after {after:?}")]
    TimedOut { label: String, after: Duration },

    #[error("{label} stopped by early termination")]
    EarlyTerminated { label: String },

    #[error("{label} failed: {message}")]
    Panicked { label: String, message: String },
}

impl WatchdogError {
    /// The state the unit ended in
    pub fn state(&self) -> UnitState {
        match self {
            Self::TimedOut { .. } => UnitState::TimedOut,
            Self::EarlyTerminated { .. } => UnitState::Cancelled,
            Self::Panicked { .. } => UnitState::Completed,
        }
    }
}

/// Runs units of work under a deadline and the early-termination signal
///
/// Each unit receives a [`CancellationToken`]. When the deadline passes or the
/// signal is set, the token is cancelled and the unit gets `grace_period` to
/// return; after that it is abandoned and its task aborted at its next await.
#[derive(Debug, Clone)]
pub struct Watchdog {
    termination: EarlyTermination,
    poll_interval: Duration,
    grace_period: Duration,
}

impl Watchdog {
    pub fn new(termination: EarlyTermination, poll_interval: Duration, grace_period: Duration) -> Self {
        Self {
            termination,
            poll_interval,
            grace_period,
        }
    }

    /// Runs `unit` bounded by `timeout`
    ///
    /// # State Machine
    ///
    /// | From | Condition | To | Result |
    /// |------|-----------|----|--------|
    /// | Pending | signal already set | Cancelled | `EarlyTerminated`, unit never starts |
    /// | Running | unit returns | Completed | the unit's output |
    /// | Running | deadline passes | TimedOut | `TimedOut` |
    /// | Running | signal seen by the poller | Cancelled | `EarlyTerminated` |
    ///
    /// The deadline is exact; the signal is observed within one `poll_interval`.
    /// A unit that completes on the same tick it overruns still counts as completed.
    pub async fn run_bounded<F, Fut, T>(
        &self,
        label: &str,
        timeout: Duration,
        unit: F,
    ) -> Result<T, WatchdogError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.termination.is_set() {
            tracing::debug!(label, state = ?UnitState::Cancelled, "Unit skipped, termination already set");
            return Err(WatchdogError::EarlyTerminated {
                label: label.to_string(),
            });
        }

        let token = self.termination.child_token();
        let mut handle = tokio::spawn(unit(token.clone()));
        let deadline = Instant::now() + timeout;

        let mut poller = tokio::time::interval(self.poll_interval);
        poller.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::trace!(label, state = ?UnitState::Running, ?timeout, "Unit started");

        let state = loop {
            tokio::select! {
                biased;

                joined = &mut handle => {
                    return match joined {
                        Ok(output) => {
                            tracing::trace!(label, state = ?UnitState::Completed, "Unit finished");
                            Ok(output)
                        }
                        Err(e) => Err(WatchdogError::Panicked {
                            label: label.to_string(),
                            message: e.to_string(),
                        }),
                    };
                }
                _ = tokio::time::sleep_until(deadline) => break UnitState::TimedOut,
                _ = poller.tick() => {
                    if self.termination.is_set() {
                        break UnitState::Cancelled;
                    }
                }
            }
        };

        token.cancel();
        if tokio::time::timeout(self.grace_period, &mut handle).await.is_err() {
            tracing::debug!(label, grace = ?self.grace_period, "Unit ignored stop signal, abandoning");
            handle.abort();
        }

        match state {
            UnitState::TimedOut => {
                tracing::warn!(label, ?timeout, "Unit timed out");
                Err(WatchdogError::TimedOut {
                    label: label.to_string(),
                    after: timeout,
                })
            }
            _ => {
                tracing::debug!(label, "Unit cancelled by early termination");
                Err(WatchdogError::EarlyTerminated {
                    label: label.to_string(),
                })
            }
        }
    }
}
