//! Process-wide registry of group timers.
//!
//! Owns every [`Group`], indexes them by channel and guild, and keeps the
//! member → timer map that enforces "one group at a time" across all
//! ledgers.
//!
//! Locking: the registry lock is always taken before a group's lock, never
//! after. Group operations never reach back into the registry.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::ids::{ChannelId, GuildId, MemberId, TimerId};
use crate::ledger::SessionRecord;
use crate::timer::GroupTimer;

/// A registered group timer.
///
/// Identity fields are immutable and readable without locking; the state
/// machine itself sits behind the group's own mutex.
#[derive(Debug)]
pub struct Group {
    id: TimerId,
    name: String,
    channel_id: ChannelId,
    guild_id: GuildId,
    timer: Mutex<GroupTimer>,
}

impl Group {
    fn new(name: &str, channel_id: ChannelId, guild_id: GuildId) -> Self {
        let id = TimerId::new();
        Self {
            id,
            name: name.to_string(),
            channel_id,
            guild_id,
            timer: Mutex::new(GroupTimer::new(id, name, channel_id, guild_id)),
        }
    }

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

    /// Lock the timer state. Keep the guard short-lived.
    pub fn lock(&self) -> MutexGuard<'_, GroupTimer> {
        self.timer.lock()
    }
}

/// Outcome of resolving a free-text group name.
#[derive(Debug, Clone)]
pub enum TimerMatch {
    Unique(Arc<Group>),
    /// Several candidates; the caller decides how to disambiguate.
    Ambiguous(Vec<Arc<Group>>),
    NoMatch,
}

#[derive(Default)]
struct Inner {
    timers: IndexMap<TimerId, Arc<Group>>,
    by_channel: HashMap<ChannelId, Vec<TimerId>>,
    guild_channels: HashMap<GuildId, Vec<ChannelId>>,
    members: HashMap<MemberId, TimerId>,
}

impl Inner {
    fn channel_timers(&self, channel: ChannelId) -> Vec<Arc<Group>> {
        self.by_channel
            .get(&channel)
            .into_iter()
            .flatten()
            .filter_map(|id| self.timers.get(id).cloned())
            .collect()
    }
}

#[derive(Default)]
pub struct TimerRegistry {
    inner: RwLock<Inner>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new, unconfigured timer in `channel`.
    ///
    /// # Errors
    ///
    /// `InvalidName` for a blank name, `DuplicateName` if the channel already
    /// has a group of that name (case-insensitive).
    pub fn create_timer(
        &self,
        guild: GuildId,
        channel: ChannelId,
        name: &str,
    ) -> Result<Arc<Group>, RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::InvalidName);
        }

        let folded = name.to_lowercase();
        let mut inner = self.inner.write();
        if inner
            .channel_timers(channel)
            .iter()
            .any(|g| g.name().to_lowercase() == folded)
        {
            return Err(RegistryError::DuplicateName {
                name: name.to_string(),
            });
        }

        let group = Arc::new(Group::new(name, channel, guild));
        inner.timers.insert(group.id(), Arc::clone(&group));
        let channel_entry = inner.by_channel.entry(channel).or_default();
        let first_in_channel = channel_entry.is_empty();
        channel_entry.push(group.id());
        if first_in_channel {
            inner.guild_channels.entry(guild).or_default().push(channel);
        }

        tracing::info!(timer = %group.id(), name, channel = %channel, guild = %guild, "group created");
        Ok(group)
    }

    pub fn get(&self, id: TimerId) -> Option<Arc<Group>> {
        self.inner.read().timers.get(&id).cloned()
    }

    /// Every registered group, in creation order.
    pub fn timers(&self) -> Vec<Arc<Group>> {
        self.inner.read().timers.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The group `member` is currently subscribed to.
    pub fn timer_for_member(&self, member: MemberId) -> Option<Arc<Group>> {
        let inner = self.inner.read();
        let id = inner.members.get(&member)?;
        inner.timers.get(id).cloned()
    }

    /// Subscribe `member` to `group` starting at `now`.
    ///
    /// # Errors
    ///
    /// `AlreadySubscribed` if the member is in any group, `UnknownTimer` if
    /// `group` is not registered here.
    pub fn sub(
        &self,
        member: MemberId,
        group: &Group,
        now: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.write();
        if !inner.timers.contains_key(&group.id()) {
            return Err(RegistryError::UnknownTimer(group.id()));
        }
        if let Some(current) = inner.members.get(&member) {
            return Err(RegistryError::AlreadySubscribed { timer: *current });
        }
        group
            .lock()
            .ledger_mut()
            .join(member, now)
            .map_err(|_| RegistryError::AlreadySubscribed { timer: group.id() })?;
        inner.members.insert(member, group.id());
        Ok(())
    }

    /// Unsubscribe `member` from whatever group they are in.
    ///
    /// # Errors
    ///
    /// `NotSubscribed` if the member has no group.
    pub fn unsub(&self, member: MemberId, now: DateTime<Utc>) -> Result<SessionRecord, RegistryError> {
        let mut inner = self.inner.write();
        let id = *inner
            .members
            .get(&member)
            .ok_or(RegistryError::NotSubscribed)?;
        let group = inner
            .timers
            .get(&id)
            .cloned()
            .ok_or(RegistryError::UnknownTimer(id))?;
        let record = group
            .lock()
            .ledger_mut()
            .leave(member, now)
            .map_err(|_| RegistryError::NotSubscribed)?;
        inner.members.remove(&member);
        Ok(record)
    }

    /// Groups bound to `channel`, in creation order.
    pub fn timers_for_channel(&self, channel: ChannelId) -> Vec<Arc<Group>> {
        self.inner.read().channel_timers(channel)
    }

    pub fn channel_has_timers(&self, channel: ChannelId) -> bool {
        self.inner
            .read()
            .by_channel
            .get(&channel)
            .is_some_and(|ids| !ids.is_empty())
    }

    /// Groups in every channel of `guild`, channel by channel.
    pub fn timers_for_guild(&self, guild: GuildId) -> Vec<Arc<Group>> {
        self.guild_channels(guild)
            .into_iter()
            .flat_map(|(_, groups)| groups)
            .collect()
    }

    /// `guild`'s channels that have groups, each with its groups.
    pub fn guild_channels(&self, guild: GuildId) -> Vec<(ChannelId, Vec<Arc<Group>>)> {
        let inner = self.inner.read();
        inner
            .guild_channels
            .get(&guild)
            .into_iter()
            .flatten()
            .map(|channel| (*channel, inner.channel_timers(*channel)))
            .collect()
    }

    /// Resolve a free-text group name.
    ///
    /// Candidates are the channel's groups when `channel_only`, otherwise the
    /// whole guild's. Matching is case-insensitive; an empty query matches
    /// every candidate, and a single exact name match beats substring matches.
    pub fn match_timers(
        &self,
        channel: ChannelId,
        guild: GuildId,
        query: &str,
        channel_only: bool,
    ) -> TimerMatch {
        let candidates = if channel_only {
            self.timers_for_channel(channel)
        } else {
            self.timers_for_guild(guild)
        };
        let query = query.trim().to_lowercase();

        let mut exact: Vec<Arc<Group>> = Vec::new();
        let mut partial: Vec<Arc<Group>> = Vec::new();
        for group in candidates {
            let name = group.name().to_lowercase();
            if name == query {
                exact.push(group);
            } else if name.contains(&query) {
                partial.push(group);
            }
        }

        if exact.len() == 1 {
            return exact.pop().map_or(TimerMatch::NoMatch, TimerMatch::Unique);
        }
        exact.extend(partial);
        match exact.len() {
            0 => TimerMatch::NoMatch,
            1 => exact.pop().map_or(TimerMatch::NoMatch, TimerMatch::Unique),
            _ => TimerMatch::Ambiguous(exact),
        }
    }
}
