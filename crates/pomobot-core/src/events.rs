use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, GuildId, TimerId};

/// Why a timer entered a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryCause {
    /// `start()` from stopped.
    Started,
    /// `setup()` on a running timer restarted the cycle.
    Restarted,
    /// The scheduler crossed a stage boundary.
    Advanced,
}

/// A timer entered a stage. Produced by the engine, delivered by a
/// [`NotificationSink`](crate::notify::NotificationSink).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEntry {
    pub timer_id: TimerId,
    pub timer_name: String,
    pub channel_id: ChannelId,
    pub guild_id: GuildId,
    pub stage_index: usize,
    pub stage_name: String,
    pub message: String,
    pub duration_secs: u64,
    pub cause: EntryCause,
    /// Stages passed over without notification because the scheduler was
    /// late by more than one whole stage.
    #[serde(default)]
    pub skipped: usize,
    pub at: DateTime<Utc>,
}

/// Engine events as they leave the process (e.g. through a channel sink).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    StageEntered(StageEntry),
    TimerStopped {
        timer_id: TimerId,
        timer_name: String,
        channel_id: ChannelId,
        at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_internally_tagged() {
        let event = Event::TimerStopped {
            timer_id: TimerId::new(),
            timer_name: "espresso".into(),
            channel_id: ChannelId(5),
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "TimerStopped");
        assert_eq!(json["channel_id"], 5);
    }
}
