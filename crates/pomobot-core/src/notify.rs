//! Notification delivery seam.
//!
//! The engine hands stage entries to a [`NotificationSink`]; how they reach
//! the chat platform is the sink's business. Sinks must not block and must
//! swallow their own delivery failures.

use tokio::sync::mpsc;

use crate::events::{Event, StageEntry};

/// Receives engine notifications.
pub trait NotificationSink: Send + Sync {
    /// A timer entered a stage.
    fn notify_stage_entry(&self, entry: &StageEntry);

    /// A timer was stopped by a member.
    fn notify_stopped(&self, _event: &Event) {
        // default no-op
    }
}

/// Logs notifications and nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify_stage_entry(&self, entry: &StageEntry) {
        tracing::info!(
            timer = %entry.timer_id,
            channel = %entry.channel_id,
            stage = entry.stage_index,
            name = %entry.stage_name,
            skipped = entry.skipped,
            "stage entered"
        );
    }
}

/// Forwards notifications as [`Event`]s into an unbounded channel, for a
/// delivery task on the other end.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving half.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::warn!("notification receiver dropped; discarding event");
        }
    }
}

impl NotificationSink for ChannelSink {
    fn notify_stage_entry(&self, entry: &StageEntry) {
        self.send(Event::StageEntered(entry.clone()));
    }

    fn notify_stopped(&self, event: &Event) {
        self.send(event.clone());
    }
}
