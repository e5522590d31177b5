//! The engine as one owned service object.
//!
//! [`TimerService`] bundles the registry, the clock and the notification
//! sink. The command layer calls it for every user operation; it takes the
//! time from the clock, runs the operation under the group's lock, and
//! delivers any resulting notification after the lock is released.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::error::{RegistryError, TimerError};
use crate::events::{Event, StageEntry};
use crate::ids::{ChannelId, GuildId, MemberId};
use crate::ledger::SessionRecord;
use crate::notify::NotificationSink;
use crate::registry::{Group, TimerRegistry};
use crate::scheduler::Scheduler;
use crate::timer::StageList;

#[derive(Clone)]
pub struct TimerService<C: Clock> {
    registry: Arc<TimerRegistry>,
    clock: C,
    sink: Arc<dyn NotificationSink>,
}

impl<C: Clock> TimerService<C> {
    pub fn new(clock: C, sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_registry(Arc::new(TimerRegistry::new()), clock, sink)
    }

    pub fn with_registry(
        registry: Arc<TimerRegistry>,
        clock: C,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            registry,
            clock,
            sink,
        }
    }

    pub fn registry(&self) -> &Arc<TimerRegistry> {
        &self.registry
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// A scheduler sharing this service's registry, clock and sink.
    pub fn scheduler(&self, poll_interval: Duration) -> Scheduler<C> {
        Scheduler::new(
            Arc::clone(&self.registry),
            self.clock.clone(),
            Arc::clone(&self.sink),
            poll_interval,
        )
    }

    pub fn create_group(
        &self,
        guild: GuildId,
        channel: ChannelId,
        name: &str,
    ) -> Result<Arc<Group>, RegistryError> {
        self.registry.create_timer(guild, channel, name)
    }

    pub fn join(&self, member: MemberId, group: &Group) -> Result<(), RegistryError> {
        self.registry.sub(member, group, self.clock.now())
    }

    pub fn leave(&self, member: MemberId) -> Result<SessionRecord, RegistryError> {
        self.registry.unsub(member, self.clock.now())
    }

    /// Replace a group's stages. A running group restarts at stage 0 and the
    /// stage-entry notification is delivered.
    pub fn setup(&self, group: &Group, stages: StageList) -> Option<StageEntry> {
        let entry = group.lock().setup(stages, self.clock.now());
        if let Some(entry) = &entry {
            self.sink.notify_stage_entry(entry);
        }
        entry
    }

    pub fn start(&self, group: &Group) -> Result<StageEntry, TimerError> {
        let entry = group.lock().start(self.clock.now())?;
        self.sink.notify_stage_entry(&entry);
        Ok(entry)
    }

    pub fn stop(&self, group: &Group) -> Result<(), TimerError> {
        group.lock().stop()?;
        self.sink.notify_stopped(&Event::TimerStopped {
            timer_id: group.id(),
            timer_name: group.name().to_string(),
            channel_id: group.channel_id(),
            at: self.clock.now(),
        });
        Ok(())
    }
}
