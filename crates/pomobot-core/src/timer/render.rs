//! Human-readable rendering of timer state.
//!
//! Pure functions over a [`GroupTimer`]; nothing here mutates state, and
//! every helper is safe to call on a stopped or unconfigured timer.

use chrono::{DateTime, Duration, Utc};
use std::fmt::Write;

use super::engine::GroupTimer;

/// Format a duration as `HH:MM:SS`. Negative durations render as zero.
pub fn format_hms(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

impl GroupTimer {
    /// Time left in the current stage, or `None` when stopped.
    pub fn pretty_remaining(&self, now: DateTime<Utc>) -> Option<String> {
        self.remaining(now).map(format_hms)
    }

    /// One-line summary used when listing a guild's groups.
    pub fn pretty_summary(&self, now: DateTime<Utc>) -> String {
        let members = plural(self.member_count(), "member");
        match (self.current_stage(), self.pretty_remaining(now)) {
            (Some(stage), Some(remaining)) => format!(
                "**{}**: {} with {} remaining ({})",
                self.name(),
                stage.name,
                remaining,
                members
            ),
            _ if self.is_configured() => format!("**{}**: stopped ({})", self.name(), members),
            _ => format!("**{}**: not set up ({})", self.name(), members),
        }
    }

    /// Detailed status block: state, stage list with the current stage
    /// marked, and every member's clocked time.
    pub fn pretty_pinstatus(&self, now: DateTime<Utc>) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "**{}** in <#{}>", self.name(), self.channel_id());

        match (self.stage_index(), self.stages()) {
            (Some(index), Some(stages)) => {
                let stage_name = stages.get(index).map(|s| s.name.as_str()).unwrap_or("?");
                let _ = writeln!(
                    out,
                    "Running: stage {}/{} **{}**, {} remaining",
                    index + 1,
                    stages.len(),
                    stage_name,
                    self.pretty_remaining(now).unwrap_or_default()
                );
            }
            (None, Some(_)) => {
                let _ = writeln!(out, "Stopped. Use `start` to start the timer!");
            }
            _ => {
                let _ = writeln!(out, "Not set up. Set up the timer with `set`!");
            }
        }

        if let Some(stages) = self.stages() {
            let _ = writeln!(out, "Stages:");
            for (i, stage) in stages.iter().enumerate() {
                let marker = if self.stage_index() == Some(i) { ">" } else { " " };
                let _ = write!(out, "{marker} {}. {} ({} min)", i + 1, stage.name, stage.duration_min());
                if !stage.message.is_empty() {
                    let _ = write!(out, ": {}", stage.message);
                }
                out.push('\n');
            }
        }

        if self.ledger().is_empty() {
            let _ = writeln!(out, "No members.");
        } else {
            let _ = writeln!(out, "Members:");
            for (member, session) in self.ledger().members() {
                let _ = writeln!(out, "  <@{}> {}", member, format_hms(now - session.joined_at));
            }
        }

        out.trim_end().to_string()
    }
}
