//! Polling scheduler that drives every group timer.
//!
//! One loop, one fixed interval. Each pass snapshots the registry, locks
//! each group just long enough to `tick()` it, and only then hands the
//! collected stage entries to the sink, so slow delivery never holds a timer
//! lock or delays other timers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::Clock;
use crate::events::StageEntry;
use crate::notify::NotificationSink;
use crate::registry::TimerRegistry;

/// Drives stage transitions for every registered timer.
pub struct Scheduler<C: Clock> {
    registry: Arc<TimerRegistry>,
    clock: C,
    sink: Arc<dyn NotificationSink>,
    poll_interval: Duration,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(
        registry: Arc<TimerRegistry>,
        clock: C,
        sink: Arc<dyn NotificationSink>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            registry,
            clock,
            sink,
            poll_interval,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Run one pass at the clock's current time.
    pub fn tick_once(&self) -> Vec<StageEntry> {
        self.tick_at(self.clock.now())
    }

    /// Run one pass at `now` and deliver what it produced.
    pub fn tick_at(&self, now: DateTime<Utc>) -> Vec<StageEntry> {
        let entries: Vec<StageEntry> = self
            .registry
            .timers()
            .iter()
            .filter_map(|group| group.lock().tick(now))
            .collect();

        if !entries.is_empty() {
            tracing::debug!(count = entries.len(), "scheduler pass crossed stage boundaries");
        }
        for entry in &entries {
            self.sink.notify_stage_entry(entry);
        }
        entries
    }

    /// Run the loop on the current tokio runtime until the handle is shut
    /// down or dropped.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(interval_ms = self.poll_interval.as_millis() as u64, "scheduler started");
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = interval.tick() => {
                        self.tick_once();
                    }
                }
            }
            tracing::info!("scheduler stopped");
        });
        SchedulerHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

/// Owner of a running scheduler loop.
pub struct SchedulerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!(error = %e, "scheduler task ended abnormally");
        }
    }
}
