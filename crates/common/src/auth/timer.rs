//! One-shot proactive refresh timer.
//!
//! At most one timer is pending at a time: arming replaces (aborts) the
//! previous one. A firing timer detaches itself from the slot before running
//! its callback, so a callback that re-arms the timer never aborts itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

struct Armed {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Holder for the single pending refresh task
#[derive(Default)]
pub struct RefreshTimer {
    slot: Arc<Mutex<Option<Armed>>>,
    generation: AtomicU64,
}

impl RefreshTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay`, cancelling any previously armed task
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&self, delay: Duration, task: BoxFuture<'static, ()>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let slot = Arc::clone(&self.slot);

        // Hold the slot while spawning so a zero-delay task cannot detach
        // before it has been recorded.
        let mut current = self.slot.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut armed = slot.lock();
                if armed.as_ref().is_some_and(|a| a.generation == generation) {
                    *armed = None;
                }
            }
            task.await;
        });

        if let Some(previous) = current.replace(Armed { generation, handle }) {
            previous.handle.abort();
        }
        debug!(delay_secs = delay.as_secs(), "Armed token refresh timer");
    }

    /// Cancel the pending task, if any; returns whether one was pending
    pub fn cancel(&self) -> bool {
        match self.slot.lock().take() {
            Some(armed) => {
                armed.handle.abort();
                debug!("Cancelled token refresh timer");
                true
            }
            None => false,
        }
    }

    /// Whether a task is waiting to fire
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        if let Some(armed) = self.slot.lock().take() {
            armed.handle.abort();
        }
    }
}
