//! Periodic TTL sweeper task.
//!
//! Runs on the tokio runtime alongside user operations; each tick takes the
//! same writer lock the engine uses for inserts and deletes. Shutdown is
//! signalled over a watch channel and joins the task, so cancellation is
//! deterministic and idempotent.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::engine::VectorEngine;

pub(crate) struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub(crate) fn spawn(engine: Arc<VectorEngine>, interval: Duration) -> Self {
        let (shutdown, mut rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; the sweep starts one
            // interval after spawn.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let swept = engine.sweep_expired();
                        if swept > 0 {
                            debug!(swept, "TTL sweep pass finished");
                        }
                    }
                    _ = rx.changed() => break,
                }
            }
        });
        Self { shutdown, task }
    }

    pub(crate) async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}
