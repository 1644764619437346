//! Supervised background work.
//!
//! Stale-while-revalidate refreshes run here instead of being detached, so a
//! failed refresh is logged and shutdown can wait for the ones in flight.

use std::future::Future;
use std::sync::Arc;

use offgrid_core::Error;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

#[derive(Clone, Default)]
pub struct BackgroundTasks {
    set: Arc<Mutex<JoinSet<()>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task`; an `Err` is logged under `label`. Finished tasks are reaped on each spawn.
    pub async fn spawn<F>(&self, label: String, task: F)
    where
        F: Future<Output = Result<(), Error>> + Send + 'static,
    {
        let mut set = self.set.lock().await;
        while let Some(finished) = set.try_join_next() {
            log_join(finished);
        }
        set.spawn(async move {
            if let Err(e) = task.await {
                tracing::warn!(task = %label, error = %e, "background task failed");
            }
        });
    }

    /// Number of tasks not yet reaped.
    pub async fn len(&self) -> usize {
        self.set.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Wait for every task spawned so far. Returns how many were drained.
    pub async fn shutdown(&self) -> usize {
        let mut set = std::mem::take(&mut *self.set.lock().await);
        let mut drained = 0;
        while let Some(finished) = set.join_next().await {
            log_join(finished);
            drained += 1;
        }
        drained
    }
}

fn log_join(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result
        && e.is_panic()
    {
        tracing::error!(error = %e, "background task panicked");
    }
}
