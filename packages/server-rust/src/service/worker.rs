//! Background task that runs a job on a fixed period until stopped.
//!
//! Each [`PeriodicTask`] owns one spawned tokio task, so every schedule can be
//! cancelled on its own. A failing tick is logged and the schedule continues.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::logging::SharedLogger;

// ---------------------------------------------------------------------------
// PeriodicJob trait
// ---------------------------------------------------------------------------

/// Work executed by a [`PeriodicTask`] on every tick.
#[async_trait]
pub trait PeriodicJob: Send + Sync + 'static {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    async fn tick(&self) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// PeriodicTask
// ---------------------------------------------------------------------------

/// Handle to a running periodic job.
///
/// The first tick fires one full `period` after [`start`](Self::start).
/// Dropping the handle aborts the task.
pub struct PeriodicTask {
    name: &'static str,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    pub fn start(job: Arc<dyn PeriodicJob>, period: Duration, logger: SharedLogger) -> Self {
        let name = job.name();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = job.tick().await {
                            logger.error(&format!("{name} tick failed: {e:#}"));
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
            logger.debug(&format!("{name} stopped"));
        });

        Self {
            name,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signals the task and waits for an in-progress tick to finish.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
