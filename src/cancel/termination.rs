use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;

/// Run-wide early-termination signal
///
/// Clones share one flag. `set` is idempotent and `reset` arms a fresh flag for
/// the next run; tokens handed out before a reset stay cancelled.
#[derive(Debug, Clone, Default)]
pub struct EarlyTermination {
    current: Arc<RwLock<CancellationToken>>,
}

impl EarlyTermination {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, CancellationToken> {
        self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CancellationToken> {
        self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set(&self) {
        let token = self.read();
        if !token.is_cancelled() {
            tracing::info!("Early termination requested");
            token.cancel();
        }
    }

    /// Clears the flag; call once at the start of a run, before any worker starts
    pub fn reset(&self) {
        let mut token = self.write();
        if token.is_cancelled() {
            *token = CancellationToken::new();
        }
    }

    pub fn is_set(&self) -> bool {
        self.read().is_cancelled()
    }

    /// A token cancelled when the flag is set
    pub fn token(&self) -> CancellationToken {
        self.read().clone()
    }

    /// A token cancelled when the flag is set or when cancelled on its own
    pub fn child_token(&self) -> CancellationToken {
        self.read().child_token()
    }
}
