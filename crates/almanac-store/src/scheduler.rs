//! Debounced save scheduling.
//!
//! Each call to [`SaveScheduler::arm`] cancels the pending save and starts a
//! new countdown, so a burst of mutations produces a single write once the
//! store has been quiet for the configured delay.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::error::StoreResult;

#[derive(Debug, Default)]
struct Pending {
    /// Bumped on every arm and cancel; a timer only fires if it still holds
    /// the current generation.
    generation: u64,
    task: Option<JoinHandle<()>>,
}

/// A restartable one-shot timer running on a tokio runtime.
#[derive(Debug)]
pub struct SaveScheduler {
    handle: Handle,
    delay: Duration,
    pending: Arc<Mutex<Pending>>,
}

impl SaveScheduler {
    /// Creates a scheduler on the ambient runtime.
    ///
    /// ## Errors
    /// Returns `StoreError::NoRuntime` when called outside a tokio runtime.
    pub fn new(delay: Duration) -> StoreResult<Self> {
        let handle = Handle::try_current()?;
        Ok(Self::with_handle(handle, delay))
    }

    #[must_use]
    pub fn with_handle(handle: Handle, delay: Duration) -> Self {
        Self {
            handle,
            delay,
            pending: Arc::new(Mutex::new(Pending::default())),
        }
    }

    /// Schedules `save` to run on the blocking pool after the delay,
    /// replacing any pending one.
    pub fn arm<F>(&self, save: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut pending = self.pending.lock();
        pending.generation += 1;
        let generation = pending.generation;
        if let Some(task) = pending.task.take() {
            task.abort();
        }

        let delay = self.delay;
        let shared = Arc::clone(&self.pending);
        pending.task = Some(self.handle.spawn(async move {
            sleep(delay).await;
            {
                let mut pending = shared.lock();
                if pending.generation != generation {
                    return;
                }
                pending.task = None;
            }
            tracing::debug!(generation, "Debounced save fired");
            if let Err(err) = tokio::task::spawn_blocking(save).await {
                tracing::warn!(%err, "Debounced save task failed");
            }
        }));
        tracing::debug!(generation, delay_ms = delay.as_millis(), "Debounced save armed");
    }

    /// Cancels the pending save. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        let mut pending = self.pending.lock();
        pending.generation += 1;
        match pending.task.take() {
            Some(task) => {
                task.abort();
                tracing::debug!("Debounced save cancelled");
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.lock().task.is_some()
    }
}
