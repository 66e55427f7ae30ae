use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, info_span, warn};

/// Bounded executor for fire-and-forget work.
///
/// Spawning never blocks the caller. At most `limit` tasks run at once, the
/// rest wait for a permit. Outcomes are only reported through logging: a task
/// resolving to `Err` is logged at `warn` and dropped.
#[derive(Debug, Clone)]
pub struct TaskPool {
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    limit: usize,
}

impl TaskPool {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self { permits: Arc::new(Semaphore::new(limit)), tracker: TaskTracker::new(), limit }
    }

    /// Maximum number of tasks running concurrently.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Tasks spawned and not yet finished, waiting ones included.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Submits `job` without waiting for it.
    pub fn spawn<F, E>(&self, label: &'static str, job: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let span = info_span!("background", task = label);

        self.tracker.spawn(
            async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    warn!("Task pool closed, job dropped");
                    return;
                };
                match job.await {
                    Ok(()) => debug!("Background task finished"),
                    Err(e) => warn!(error = %e, "Background task failed"),
                }
            }
            .instrument(span),
        );
    }

    /// Waits until every task spawned so far has finished.
    ///
    /// The pool stays usable afterwards.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Like [`TaskPool::drain`], bounded by `timeout`. Returns `false` when
    /// tasks were still running at the deadline.
    pub async fn drain_timeout(&self, timeout: Duration) -> bool {
        let drained = tokio::time::timeout(timeout, self.drain()).await.is_ok();
        if !drained {
            self.tracker.reopen();
            warn!(pending = self.tracker.len(), "Background tasks still running after drain timeout");
        }
        drained
    }
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new(64)
    }
}
