//! Group timer state machine.
//!
//! Like the single-user engine it grew out of, a group timer has no thread of
//! its own. Every operation takes the current time from the caller, and the
//! scheduler is responsible for calling `tick()` periodically.
//!
//! ## State Transitions
//!
//! ```text
//! Stopped --start--> Running --stop--> Stopped
//!                    Running --tick--> Running (next stage, wraps)
//!                    Running --setup--> Running (stage 0 of new list)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut timer = GroupTimer::new(TimerId::new(), "espresso", channel, guild);
//! timer.setup(StageList::parse("Study, 25; Break, 5")?, now);
//! let entry = timer.start(now)?;
//! // In the scheduler loop:
//! timer.tick(now); // Returns Some(StageEntry) when a stage boundary is crossed
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::stages::{Stage, StageList};
use crate::error::TimerError;
use crate::events::{EntryCause, StageEntry};
use crate::ids::{ChannelId, GuildId, MemberId, TimerId};
use crate::ledger::SubscriptionLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Stopped,
    Running,
}

/// Run state with the fields that only make sense while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Stopped,
    Running {
        stage_index: usize,
        stage_started_at: DateTime<Utc>,
        deadline: DateTime<Utc>,
    },
}

/// One group timer bound to a channel.
#[derive(Debug, Clone)]
pub struct GroupTimer {
    id: TimerId,
    name: String,
    channel_id: ChannelId,
    guild_id: GuildId,
    stages: Option<StageList>,
    run: RunState,
    ledger: SubscriptionLedger,
}

/// Serializable view of a timer at one instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub timer_id: TimerId,
    pub name: String,
    pub channel_id: ChannelId,
    pub guild_id: GuildId,
    pub state: TimerState,
    pub stage_index: Option<usize>,
    pub stage_name: Option<String>,
    pub remaining_secs: Option<u64>,
    /// Canonical setup string, if configured.
    pub setup: Option<String>,
    pub members: Vec<MemberClock>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberClock {
    pub member_id: MemberId,
    pub clocked_secs: u64,
}

impl GroupTimer {
    /// Create an unconfigured, stopped timer.
    pub fn new(id: TimerId, name: impl Into<String>, channel_id: ChannelId, guild_id: GuildId) -> Self {
        Self {
            id,
            name: name.into(),
            channel_id,
            guild_id,
            stages: None,
            run: RunState::Stopped,
            ledger: SubscriptionLedger::new(id),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn id(&self) -> TimerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn state(&self) -> TimerState {
        match self.run {
            RunState::Stopped => TimerState::Stopped,
            RunState::Running { .. } => TimerState::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == TimerState::Running
    }

    pub fn stages(&self) -> Option<&StageList> {
        self.stages.as_ref()
    }

    pub fn is_configured(&self) -> bool {
        self.stages.is_some()
    }

    /// Index of the current stage; `None` while stopped.
    pub fn stage_index(&self) -> Option<usize> {
        match self.run {
            RunState::Running { stage_index, .. } => Some(stage_index),
            RunState::Stopped => None,
        }
    }

    pub fn current_stage(&self) -> Option<&Stage> {
        let index = self.stage_index()?;
        self.stages.as_ref()?.get(index)
    }

    /// When the current stage ends; `None` while stopped.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        match self.run {
            RunState::Running { deadline, .. } => Some(deadline),
            RunState::Stopped => None,
        }
    }

    /// When the current stage began; `None` while stopped.
    pub fn stage_started_at(&self) -> Option<DateTime<Utc>> {
        match self.run {
            RunState::Running {
                stage_started_at, ..
            } => Some(stage_started_at),
            RunState::Stopped => None,
        }
    }

    /// Time left in the current stage, clamped at zero.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.deadline()
            .map(|deadline| (deadline - now).max(Duration::zero()))
    }

    pub fn ledger(&self) -> &SubscriptionLedger {
        &self.ledger
    }

    pub(crate) fn ledger_mut(&mut self) -> &mut SubscriptionLedger {
        &mut self.ledger
    }

    pub fn member_count(&self) -> usize {
        self.ledger.len()
    }

    /// Build a full state snapshot.
    pub fn snapshot(&self, now: DateTime<Utc>) -> TimerSnapshot {
        TimerSnapshot {
            timer_id: self.id,
            name: self.name.clone(),
            channel_id: self.channel_id,
            guild_id: self.guild_id,
            state: self.state(),
            stage_index: self.stage_index(),
            stage_name: self.current_stage().map(|s| s.name.clone()),
            remaining_secs: self
                .remaining(now)
                .map(|r| r.num_seconds().max(0) as u64),
            setup: self.stages.as_ref().map(StageList::to_setup_string),
            members: self
                .ledger
                .members()
                .map(|(member_id, _)| MemberClock {
                    member_id,
                    clocked_secs: self
                        .ledger
                        .clocked(member_id, now)
                        .map(|d| d.num_seconds().max(0) as u64)
                        .unwrap_or(0),
                })
                .collect(),
            at: now,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Replace the stage list.
    ///
    /// A stopped timer stays stopped. A running timer restarts at stage 0 of
    /// the new list and the entry for that stage is returned.
    pub fn setup(&mut self, stages: StageList, now: DateTime<Utc>) -> Option<StageEntry> {
        tracing::info!(
            timer = %self.id,
            name = %self.name,
            stages = stages.len(),
            running = self.is_running(),
            "timer set up"
        );
        self.stages = Some(stages);
        if self.is_running() {
            Some(self.enter_stage(0, now, EntryCause::Restarted, 0))
        } else {
            None
        }
    }

    /// Start from stage 0.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` if running, `NotConfigured` if no stages are set up.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<StageEntry, TimerError> {
        if self.is_running() {
            return Err(TimerError::AlreadyRunning);
        }
        if self.stages.is_none() {
            return Err(TimerError::NotConfigured);
        }
        tracing::info!(timer = %self.id, name = %self.name, "timer started");
        Ok(self.enter_stage(0, now, EntryCause::Started, 0))
    }

    /// Stop the timer. The stage list is kept for a later `start()`.
    ///
    /// # Errors
    ///
    /// `NotRunning` if already stopped.
    pub fn stop(&mut self) -> Result<(), TimerError> {
        if !self.is_running() {
            return Err(TimerError::NotRunning);
        }
        self.run = RunState::Stopped;
        tracing::info!(timer = %self.id, name = %self.name, "timer stopped");
        Ok(())
    }

    /// Advance past an expired stage. Returns the entry for the new stage.
    ///
    /// A no-op before the deadline or while stopped, so repeated calls with
    /// the same `now` fire at most once. If `now` lies beyond the end of the
    /// following stage too, the timer jumps straight to the stage containing
    /// `now` (stage ends chained from the old deadline) and reports the
    /// number of stages passed over in [`StageEntry::skipped`].
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<StageEntry> {
        let RunState::Running {
            stage_index,
            deadline,
            ..
        } = self.run
        else {
            return None;
        };
        if now < deadline {
            return None;
        }
        let stages = self.stages.as_ref()?;

        let cycle_ms = stages.cycle_duration().num_milliseconds().max(1);
        let overdue_ms = (now - deadline).num_milliseconds();
        let whole_cycles = overdue_ms / cycle_ms;

        let mut boundary = deadline + Duration::milliseconds(whole_cycles * cycle_ms);
        let mut index = stages.next_index(stage_index);
        let mut stage_end = boundary + stages.get(index)?.duration();
        let mut walked = 0;
        while stage_end <= now {
            index = stages.next_index(index);
            boundary = stage_end;
            stage_end = boundary + stages.get(index)?.duration();
            walked += 1;
        }
        let skipped = whole_cycles as usize * stages.len() + walked;

        if skipped == 0 {
            Some(self.enter_stage(index, now, EntryCause::Advanced, 0))
        } else {
            tracing::warn!(
                timer = %self.id,
                skipped,
                "scheduler fell behind; collapsing to current stage"
            );
            Some(self.enter_stage(index, boundary, EntryCause::Advanced, skipped))
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Enter `index` at `started_at`, with the deadline one stage later.
    fn enter_stage(
        &mut self,
        index: usize,
        started_at: DateTime<Utc>,
        cause: EntryCause,
        skipped: usize,
    ) -> StageEntry {
        let (stage_name, message, duration_secs, duration) = match self
            .stages
            .as_ref()
            .and_then(|s| s.get(index))
        {
            Some(stage) => (
                stage.name.clone(),
                stage.message.clone(),
                stage.duration_secs,
                stage.duration(),
            ),
            None => (String::new(), String::new(), 0, Duration::zero()),
        };
        self.run = RunState::Running {
            stage_index: index,
            stage_started_at: started_at,
            deadline: started_at + duration,
        };
        tracing::debug!(timer = %self.id, stage = index, name = %stage_name, "stage entered");
        StageEntry {
            timer_id: self.id,
            timer_name: self.name.clone(),
            channel_id: self.channel_id,
            guild_id: self.guild_id,
            stage_index: index,
            stage_name,
            message,
            duration_secs,
            cause,
            skipped,
            at: started_at,
        }
    }
}
