use std::collections::HashMap;
use std::sync::Arc;

use clap::Args;
use pomobot_core::{
    ChannelId, Clock, Config, Event, GuildId, MemberId, NotificationSink, StageEntry,
    SystemClock, TimerService,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::chat::{ChatCommand, ChatContext, ChatHandler, Outcome};

#[derive(Args)]
pub struct RunArgs {
    /// Guild id every command is attributed to
    #[arg(long, default_value_t = 1)]
    guild: u64,

    /// Override the scheduler poll interval (milliseconds)
    #[arg(long)]
    poll_ms: Option<u64>,
}

/// Prints notifications to stdout the way the bot would post them.
struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn notify_stage_entry(&self, entry: &StageEntry) {
        tracing::debug!(timer = %entry.timer_id, stage = entry.stage_index, "posting stage entry");
        println!("{}", render_entry(entry));
    }

    fn notify_stopped(&self, event: &Event) {
        if let Event::TimerStopped {
            timer_name,
            channel_id,
            ..
        } = event
        {
            println!("<#{channel_id}> **{timer_name}**: timer stopped.");
        }
    }
}

fn render_entry(entry: &StageEntry) -> String {
    let minutes = entry.duration_secs / 60;
    let mut out = format!(
        "<#{}> **{}**: Starting **{}** ({} minute{})",
        entry.channel_id,
        entry.timer_name,
        entry.stage_name,
        minutes,
        if minutes == 1 { "" } else { "s" }
    );
    if entry.skipped > 0 {
        out.push_str(&format!(" [skipped {} stage(s) while away]", entry.skipped));
    }
    if !entry.message.is_empty() {
        out.push('\n');
        out.push_str(&entry.message);
    }
    out
}

/// Split off the first whitespace-delimited word.
fn next_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], &s[i..]),
        None => (s, ""),
    }
}

fn line_member(line: &str) -> Option<MemberId> {
    next_word(line).0.parse::<u64>().ok().map(MemberId)
}

/// One input line: `<member> <channel> <command> [args...]`.
fn parse_line(line: &str, guild: GuildId) -> Result<(ChatContext, ChatCommand), String> {
    let (member, rest) = next_word(line);
    let member = member
        .parse::<u64>()
        .map_err(|_| "expected `<member> <channel> <command> [args]`")?;
    let (channel, rest) = next_word(rest);
    let channel = channel
        .parse::<u64>()
        .map_err(|_| "expected a numeric channel id after the member id")?;
    let (word, args) = next_word(rest);
    if word.is_empty() {
        return Err("missing command".into());
    }

    let command =
        ChatCommand::parse(word, args).ok_or_else(|| format!("unknown command `{word}`; try `help`"))?;
    let ctx = ChatContext {
        guild,
        channel: ChannelId(channel),
        member: MemberId(member),
    };
    Ok((ctx, command))
}

/// An answer line is `<member> <channel> yes` (or `y`).
fn is_yes(line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().skip(2).collect();
    matches!(words.as_slice(), [w] if w.eq_ignore_ascii_case("yes") || w.eq_ignore_ascii_case("y"))
}

fn render_outcome(outcome: Outcome) -> Option<String> {
    match outcome {
        Outcome::Reply(text) => Some(text),
        Outcome::Confirm(prompt) => Some(format!("{prompt} (yes/no)")),
        Outcome::Silent => None,
    }
}

/// Line-at-a-time front end over a [`ChatHandler`].
///
/// A confirmation prompt belongs to the member who triggered it: their next
/// line answers it, while lines from everyone else are handled as commands.
struct Repl<C: Clock> {
    handler: ChatHandler<C>,
    guild: GuildId,
    pending: HashMap<MemberId, (ChatContext, ChatCommand)>,
}

impl<C: Clock> Repl<C> {
    fn new(handler: ChatHandler<C>, guild: GuildId) -> Self {
        Self {
            handler,
            guild,
            pending: HashMap::new(),
        }
    }

    /// Handle one input line. `Err` carries input errors meant for stderr.
    fn feed(&mut self, line: &str) -> Result<Option<String>, String> {
        if let Some(member) = line_member(line) {
            if let Some((ctx, command)) = self.pending.remove(&member) {
                if !is_yes(line) {
                    return Ok(Some("Cancelled.".into()));
                }
                return Ok(render_outcome(self.handler.handle(ctx, command, true)));
            }
        }

        let (ctx, command) = parse_line(line, self.guild)?;
        let outcome = self.handler.handle(ctx, command.clone(), false);
        if matches!(outcome, Outcome::Confirm(_)) {
            self.pending.insert(ctx.member, (ctx, command));
        }
        Ok(render_outcome(outcome))
    }
}

pub fn run(args: RunArgs, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(args, config))
}

async fn serve(args: RunArgs, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let poll_interval = args
        .poll_ms
        .map(std::time::Duration::from_millis)
        .unwrap_or_else(|| config.poll_interval());
    let guild = GuildId(args.guild);

    let service = TimerService::new(SystemClock::new(), Arc::new(ConsoleSink));
    let scheduler = service.scheduler(poll_interval).spawn();
    let mut repl = Repl::new(ChatHandler::new(service, config.default_stages()), guild);
    tracing::info!(guild = %guild, ?poll_interval, "pomobot ready; reading commands from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }
        match repl.feed(line) {
            Ok(Some(text)) => println!("{text}"),
            Ok(None) => {}
            Err(message) => eprintln!("{message}"),
        }
    }

    scheduler.shutdown().await;
    tracing::info!("pomobot stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pomobot_core::{EntryCause, FakeClock, StageList, TimerId, TracingSink};

    fn repl() -> Repl<FakeClock> {
        let service = TimerService::new(FakeClock::new(), Arc::new(TracingSink));
        Repl::new(ChatHandler::new(service, StageList::default_cycle()), GuildId(1))
    }

    fn stage_of(repl: &Repl<FakeClock>, member: u64) -> String {
        let group = repl
            .handler
            .service()
            .registry()
            .timer_for_member(MemberId(member))
            .unwrap();
        let name = group.lock().current_stage().unwrap().name.clone();
        name
    }

    #[test]
    fn only_the_asker_answers_a_confirmation() {
        let mut repl = repl();
        repl.feed("1 10 newgroup espresso").unwrap();
        repl.feed("1 10 join espresso").unwrap();
        assert_eq!(repl.feed("1 10 start Study, 25").unwrap(), None);

        let prompt = repl.feed("1 10 set Focus, 50").unwrap().unwrap();
        assert!(prompt.ends_with("(yes/no)"));

        // Someone else's "yes" is just an unknown command.
        assert!(repl.feed("2 10 yes").unwrap_err().contains("unknown command `yes`"));
        assert_eq!(stage_of(&repl, 1), "Study");

        // Other members' commands still run while the prompt is open.
        let created = repl.feed("3 10 newgroup latte").unwrap().unwrap();
        assert!(created.starts_with("Created group **latte**"));
        assert_eq!(repl.handler.service().registry().len(), 2);

        let confirmed = repl.feed("1 10 yes").unwrap().unwrap();
        assert!(confirmed.contains("Restarting"));
        assert_eq!(stage_of(&repl, 1), "Focus");
    }

    #[test]
    fn any_other_answer_cancels() {
        let mut repl = repl();
        repl.feed("1 10 newgroup espresso").unwrap();
        repl.feed("1 10 join espresso").unwrap();
        repl.feed("1 10 start Study, 25").unwrap();
        repl.feed("1 10 set Focus, 50").unwrap();

        assert_eq!(repl.feed("1 10 stop").unwrap().as_deref(), Some("Cancelled."));
        assert_eq!(stage_of(&repl, 1), "Study");
        let group = repl
            .handler
            .service()
            .registry()
            .timer_for_member(MemberId(1))
            .unwrap();
        assert!(group.lock().is_running());

        // The prompt is gone, so the next line is an ordinary command again.
        assert_eq!(
            repl.feed("1 10 stop").unwrap().as_deref(),
            Some("Your timer has been stopped.")
        );
    }

    #[test]
    fn parses_input_lines() {
        let (ctx, command) = parse_line("7 10 join espresso doppio", GuildId(1)).unwrap();
        assert_eq!(ctx.member, MemberId(7));
        assert_eq!(ctx.channel, ChannelId(10));
        assert_eq!(command, ChatCommand::Join("espresso doppio".into()));

        let (_, command) = parse_line("  7 10 stop  ", GuildId(1)).unwrap();
        assert_eq!(command, ChatCommand::Stop);

        let (ctx, command) = parse_line("7  10\tset Study, 25;  Break, 5", GuildId(1)).unwrap();
        assert_eq!(ctx.channel, ChannelId(10));
        assert_eq!(command, ChatCommand::Set("Study, 25;  Break, 5".into()));

        assert!(parse_line("seven 10 join", GuildId(1)).is_err());
        assert!(parse_line("7 10", GuildId(1)).is_err());
        assert!(parse_line("7 10 dance", GuildId(1)).unwrap_err().contains("unknown command"));
    }

    #[test]
    fn confirmation_answers() {
        assert!(is_yes("7 10 Y"));
        assert!(is_yes("7  10  yes "));
        assert!(!is_yes("yes"));
        assert!(!is_yes("7 10 no"));
        assert!(!is_yes("7 10 yesterday"));
        assert!(!is_yes("7 10 stop yes"));
    }

    #[test]
    fn renders_stage_entries() {
        let entry = StageEntry {
            timer_id: TimerId::new(),
            timer_name: "espresso".into(),
            channel_id: ChannelId(10),
            guild_id: GuildId(1),
            stage_index: 1,
            stage_name: "Break".into(),
            message: "Good job!".into(),
            duration_secs: 300,
            cause: EntryCause::Advanced,
            skipped: 0,
            at: Utc::now(),
        };
        assert_eq!(
            render_entry(&entry),
            "<#10> **espresso**: Starting **Break** (5 minutes)\nGood job!"
        );

        let entry = StageEntry {
            duration_secs: 60,
            message: String::new(),
            skipped: 2,
            ..entry
        };
        assert_eq!(
            render_entry(&entry),
            "<#10> **espresso**: Starting **Break** (1 minute) [skipped 2 stage(s) while away]"
        );
    }
}
