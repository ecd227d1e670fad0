//! Bounded, rate-limited execution of status checks.

use super::error::{EngineError, EngineResult};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use sigtrack_core::config::ReconcileConfig;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Admission control for status checks.
///
/// At most `max_concurrent` checks hold a slot at once. Starts are spaced
/// `window / max_starts_per_window` apart with no burst, so any window of
/// length `window` holds at most `max_starts_per_window` starts.
#[derive(Clone)]
pub struct TaskQueue {
    slots: Arc<Semaphore>,
    limiter: Arc<DefaultDirectRateLimiter>,
    max_concurrent: usize,
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("max_concurrent", &self.max_concurrent)
            .field("available", &self.slots.available_permits())
            .finish_non_exhaustive()
    }
}

impl TaskQueue {
    pub fn new(
        max_concurrent: usize,
        max_starts_per_window: u32,
        window: Duration,
    ) -> EngineResult<Self> {
        if max_concurrent == 0 {
            return Err(EngineError::Config("max_concurrent must be > 0".to_string()));
        }
        if max_starts_per_window == 0 {
            return Err(EngineError::Config(
                "max_starts_per_window must be > 0".to_string(),
            ));
        }
        let quota = Quota::with_period(window / max_starts_per_window)
            .ok_or_else(|| EngineError::Config("window must be > 0".to_string()))?
            .allow_burst(NonZeroU32::MIN);

        Ok(Self {
            slots: Arc::new(Semaphore::new(max_concurrent)),
            limiter: Arc::new(RateLimiter::direct(quota)),
            max_concurrent,
        })
    }

    pub fn from_config(config: &ReconcileConfig) -> EngineResult<Self> {
        Self::new(
            config.max_concurrent,
            config.max_starts_per_window,
            config.window(),
        )
    }

    /// Wait for a free slot, then for the start rate to allow one more start.
    ///
    /// The slot is held until the returned permit is dropped.
    pub async fn admit(&self) -> EngineResult<OwnedSemaphorePermit> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| EngineError::QueueClosed)?;
        self.limiter.until_ready().await;
        Ok(permit)
    }

    /// Slots not currently held.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}
