//! Background tasks which never stay dead.
//!
//! A supervised task is spawned on its own tokio task.  When it returns an error or panics, the
//! failure is logged, the supervisor waits for the backoff, and the task is started again from
//! scratch.  Returning `Ok(())` ends supervision.

use crate::log_internal;
use std::{future::Future, time::Duration};
use tokio::task::JoinHandle;

/// Keep `task` running.  Aborting the returned handle stops the current run and all future
/// restarts.
pub fn spawn_supervised<F, Fut>(name: &'static str, backoff: Duration, task: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let handle = tokio::spawn(task());
            // Aborting the outer task drops this guard, which takes the current run down with it.
            let _run = AbortOnDrop(handle.abort_handle());
            match handle.await {
                Ok(Ok(())) => {
                    log_internal!("Background task {} finished", name);
                    return;
                }
                Ok(Err(e)) => {
                    tracing::error!(task = name, "Background task failed: {:#}", e);
                }
                Err(e) if e.is_panic() => {
                    tracing::error!(task = name, "Background task panicked");
                }
                Err(_) => {
                    log_internal!("Background task {} was cancelled", name);
                    return;
                }
            }
            tracing::warn!(
                task = name,
                "Restarting background task in {}s",
                backoff.as_secs_f64()
            );
            tokio::time::sleep(backoff).await;
        }
    })
}

struct AbortOnDrop(tokio::task::AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
