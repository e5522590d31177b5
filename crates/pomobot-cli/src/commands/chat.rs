//! Chat command layer.
//!
//! Turns one member's chat command into engine calls and a reply. Everything
//! user-facing lives here; the engine only reports typed outcomes.

use std::sync::Arc;

use pomobot_core::{
    format_hms, ChannelId, Clock, Group, GuildId, MemberId, RegistryError, StageList,
    TimerError, TimerMatch, TimerService, TimerState,
};

/// Who said it, and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatContext {
    pub guild: GuildId,
    pub channel: ChannelId,
    pub member: MemberId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Join(String),
    Leave,
    Set(String),
    Start(String),
    Stop,
    Groups,
    Status(String),
    NewGroup(String),
    Help,
}

impl ChatCommand {
    /// Parse a command word (or alias) and its argument string.
    pub fn parse(word: &str, args: &str) -> Option<Self> {
        let args = args.trim().to_string();
        Some(match word.to_lowercase().as_str() {
            "join" | "sub" => Self::Join(args),
            "leave" | "unsub" => Self::Leave,
            "set" | "setup" | "reset" => Self::Set(args),
            "start" => Self::Start(args),
            "stop" => Self::Stop,
            "groups" | "timers" => Self::Groups,
            "status" | "group" | "timer" => Self::Status(args),
            "newgroup" => Self::NewGroup(args),
            "help" => Self::Help,
            _ => return None,
        })
    }
}

/// What the host should do with a handled command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Reply(String),
    /// Nothing to say; the stage notification speaks for itself.
    Silent,
    /// Ask this question, and re-run the command confirmed on "yes".
    Confirm(String),
}

const HELP: &str = "\
Commands:
  join [group]      join a group in this channel (alias: sub)
  leave             leave your current group (alias: unsub)
  set [setup]       set up your group's stages (aliases: setup, reset)
  start [setup]     start your group's timer, optionally setting it up first
  stop              stop your group's timer
  groups            list the groups in this guild (alias: timers)
  status [group]    show a group in detail (aliases: group, timer)
  newgroup <name>   create a group in this channel";

pub struct ChatHandler<C: Clock> {
    service: TimerService<C>,
    default_stages: StageList,
}

impl<C: Clock> ChatHandler<C> {
    pub fn new(service: TimerService<C>, default_stages: StageList) -> Self {
        Self {
            service,
            default_stages,
        }
    }

    #[cfg(test)]
    pub fn service(&self) -> &TimerService<C> {
        &self.service
    }

    /// Handle one command. `confirmed` is true when re-run after a
    /// [`Outcome::Confirm`] was accepted.
    pub fn handle(&self, ctx: ChatContext, command: ChatCommand, confirmed: bool) -> Outcome {
        tracing::debug!(member = %ctx.member, channel = %ctx.channel, ?command, "chat command");
        match command {
            ChatCommand::Join(query) => self.join(ctx, &query),
            ChatCommand::Leave => self.leave(ctx),
            ChatCommand::Set(setup) => self.set(ctx, &setup, confirmed),
            ChatCommand::Start(setup) => self.start(ctx, &setup),
            ChatCommand::Stop => self.stop(ctx),
            ChatCommand::Groups => self.groups(ctx),
            ChatCommand::Status(query) => self.status(ctx, &query),
            ChatCommand::NewGroup(name) => self.new_group(ctx, &name),
            ChatCommand::Help => Outcome::Reply(HELP.to_string()),
        }
    }

    /// The member's group, or the reply explaining why there isn't one.
    fn own_group(&self, ctx: ChatContext) -> Result<Arc<Group>, Outcome> {
        let registry = self.service.registry();
        registry.timer_for_member(ctx.member).ok_or_else(|| {
            if registry.channel_has_timers(ctx.channel) {
                reply("Please join a group first!")
            } else {
                reply("There are no timers in this channel!")
            }
        })
    }

    fn join(&self, ctx: ChatContext, query: &str) -> Outcome {
        let registry = self.service.registry();
        if let Some(current) = registry.timer_for_member(ctx.member) {
            return reply(format!(
                "You are already in the group `{}` in <#{}>!",
                current.name(),
                current.channel_id()
            ));
        }

        let group = match registry.match_timers(ctx.channel, ctx.guild, query, true) {
            TimerMatch::Unique(group) => group,
            TimerMatch::Ambiguous(groups) => return ambiguous(query, &groups),
            TimerMatch::NoMatch => {
                return reply(
                    "No matching groups in this channel.\n\
                     Use the `groups` command to see the groups in this guild!",
                )
            }
        };

        if let Err(e) = self.service.join(ctx.member, &group) {
            return registry_error(e);
        }

        let now = self.service.now();
        let timer = group.lock();
        let mut message = format!("You have joined the group **{}**!", group.name());
        match (timer.state(), timer.current_stage()) {
            (TimerState::Running, Some(stage)) => message.push_str(&format!(
                "\nCurrently on stage **{}** with **{}** remaining.",
                stage.name,
                timer.pretty_remaining(now).unwrap_or_default()
            )),
            _ if timer.is_configured() => message.push_str(
                "\nGroup timer is set up but not running. Use `start` to start the timer!",
            ),
            _ => message.push_str("\nSet up the timer with `set`!"),
        }
        reply(message)
    }

    fn leave(&self, ctx: ChatContext) -> Outcome {
        let Some(group) = self.service.registry().timer_for_member(ctx.member) else {
            return reply("You need to join a group before you can leave one!");
        };
        match self.service.leave(ctx.member) {
            Ok(record) => reply(format!(
                "You have been unsubscribed from **{}**! You were subscribed for **{}**.",
                group.name(),
                format_hms(record.clocked())
            )),
            Err(e) => registry_error(e),
        }
    }

    fn set(&self, ctx: ChatContext, setup: &str, confirmed: bool) -> Outcome {
        let group = match self.own_group(ctx) {
            Ok(group) => group,
            Err(outcome) => return outcome,
        };
        if group.lock().is_running() && !confirmed {
            return Outcome::Confirm(
                "The timer is running! Are you sure you want to reset it?".into(),
            );
        }

        let stages = if setup.is_empty() {
            self.default_stages.clone()
        } else {
            match StageList::parse(setup) {
                Ok(stages) => stages,
                Err(e) => return reply(format!("Didn't understand setup string! ({e})")),
            }
        };

        match self.service.setup(&group, stages) {
            Some(_) => reply("Timer pattern set up! Restarting from the first stage."),
            None => reply("Timer pattern set up! Start when ready."),
        }
    }

    fn start(&self, ctx: ChatContext, setup: &str) -> Outcome {
        let group = match self.own_group(ctx) {
            Ok(group) => group,
            Err(outcome) => return outcome,
        };
        if group.lock().is_running() {
            return reply("Your group timer is already running!");
        }

        if !setup.is_empty() {
            match StageList::parse(setup) {
                Ok(stages) => {
                    self.service.setup(&group, stages);
                }
                Err(e) => return reply(format!("Didn't understand setup string! ({e})")),
            }
        }

        match self.service.start(&group) {
            Ok(_) => Outcome::Silent,
            Err(TimerError::NotConfigured) => {
                reply("Please set up the timer first!")
            }
            Err(TimerError::AlreadyRunning) => {
                reply("Your group timer is already running!")
            }
            Err(e) => reply(format!("Couldn't start the timer: {e}")),
        }
    }

    fn stop(&self, ctx: ChatContext) -> Outcome {
        let group = match self.own_group(ctx) {
            Ok(group) => group,
            Err(outcome) => return outcome,
        };
        match self.service.stop(&group) {
            Ok(()) => reply("Your timer has been stopped."),
            Err(_) => reply("Can't stop something that's not moving!"),
        }
    }

    fn groups(&self, ctx: ChatContext) -> Outcome {
        let sections = self.service.registry().guild_channels(ctx.guild);
        if sections.is_empty() {
            return reply("There are no groups set up in this guild!");
        }

        let now = self.service.now();
        let body = sections
            .iter()
            .map(|(channel, groups)| {
                let summaries = groups
                    .iter()
                    .map(|g| g.lock().pretty_summary(now))
                    .collect::<Vec<_>>()
                    .join("\n\n");
                format!("<#{channel}>\n\n{summaries}")
            })
            .collect::<Vec<_>>()
            .join("\n\n\n");
        reply(format!("__Group timers in this guild__\n\n{body}"))
    }

    fn status(&self, ctx: ChatContext, query: &str) -> Outcome {
        let registry = self.service.registry();
        let group = if !query.is_empty() {
            match registry.match_timers(ctx.channel, ctx.guild, query, false) {
                TimerMatch::Unique(group) => group,
                TimerMatch::Ambiguous(groups) => return ambiguous(query, &groups),
                TimerMatch::NoMatch => {
                    return reply(format!("No groups matching `{query}` in this channel!"))
                }
            }
        } else if let Some(group) = registry.timer_for_member(ctx.member) {
            group
        } else {
            match registry.match_timers(ctx.channel, ctx.guild, "", false) {
                TimerMatch::Unique(group) => group,
                TimerMatch::Ambiguous(groups) => return ambiguous("", &groups),
                TimerMatch::NoMatch => return reply("No groups are set up in this guild."),
            }
        };

        let now = self.service.now();
        let status = group.lock().pretty_pinstatus(now);
        reply(status)
    }

    fn new_group(&self, ctx: ChatContext, name: &str) -> Outcome {
        match self.service.create_group(ctx.guild, ctx.channel, name) {
            Ok(group) => reply(format!(
                "Created group **{}** in <#{}>. Use `join {}` to join it!",
                group.name(),
                ctx.channel,
                group.name()
            )),
            Err(e) => registry_error(e),
        }
    }
}

fn reply(text: impl Into<String>) -> Outcome {
    Outcome::Reply(text.into())
}

fn ambiguous(query: &str, groups: &[Arc<Group>]) -> Outcome {
    let names = groups
        .iter()
        .map(|g| format!("`{}` (<#{}>)", g.name(), g.channel_id()))
        .collect::<Vec<_>>()
        .join(", ");
    if query.is_empty() {
        reply(format!("Which group? Choose one of: {names}"))
    } else {
        reply(format!(
            "Several groups match `{query}`: {names}. Please be more specific."
        ))
    }
}

fn registry_error(error: RegistryError) -> Outcome {
    let text = match error {
        RegistryError::AlreadySubscribed { .. } => "You are already in a group!".to_string(),
        RegistryError::NotSubscribed => {
            "You need to join a group before you can leave one!".to_string()
        }
        RegistryError::DuplicateName { name } => {
            format!("There is already a group called `{name}` in this channel!")
        }
        RegistryError::InvalidName => "Please give the group a name!".to_string(),
        RegistryError::UnknownTimer(_) => "That group no longer exists.".to_string(),
    };
    reply(text)
}
