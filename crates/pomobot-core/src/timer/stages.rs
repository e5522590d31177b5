//! Stage lists and the setup-string mini-language.
//!
//! A setup string is a `;`-separated list of `name, minutes[, message]`
//! clauses:
//!
//! ```text
//! Study, 25, Good luck!; Break, 5, Have a rest.
//! ```
//!
//! Parsing is all-or-nothing: a single bad clause rejects the whole string.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Setup string used when a group is set up without one.
pub const DEFAULT_SETUP: &str = "Study, 25, Good luck!; Break, 5, Have a rest.; \
     Study, 25, Good luck!; Break, 5, Have a rest.; \
     Study, 25, Good luck!; Long Break, 10, Have a rest.";

/// Longest stage the parser accepts (one week).
const MAX_STAGE_MINUTES: u64 = 7 * 24 * 60;

/// One named, timed phase of a group timer's cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    /// Duration in seconds. Always positive.
    pub duration_secs: u64,
    #[serde(default)]
    pub message: String,
}

impl Stage {
    pub fn duration(&self) -> Duration {
        Duration::seconds(self.duration_secs as i64)
    }

    /// Whole minutes, as written in a setup string.
    pub fn duration_min(&self) -> u64 {
        self.duration_secs / 60
    }
}

/// Validated, non-empty, ordered stage sequence.
///
/// Order is play order; after the last stage the cycle returns to the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageList {
    stages: Vec<Stage>,
}

impl StageList {
    /// Parse a setup string.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] naming the first offending clause. No partial
    /// list is ever produced.
    pub fn parse(setup: &str) -> Result<Self, ParseError> {
        let mut stages = Vec::new();
        for (i, clause) in setup.split(';').enumerate() {
            if clause.trim().is_empty() {
                continue;
            }
            stages.push(parse_clause(i + 1, clause)?);
        }
        if stages.is_empty() {
            return Err(ParseError::Empty);
        }
        Ok(Self { stages })
    }

    /// The built-in default cycle.
    pub fn default_cycle() -> Self {
        Self::parse(DEFAULT_SETUP).unwrap_or_else(|_| Self {
            stages: vec![Stage {
                name: "Study".into(),
                duration_secs: 25 * 60,
                message: String::new(),
            }],
        })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True when the list holds no stages. Parsed lists never do.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    pub fn first(&self) -> &Stage {
        &self.stages[0]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Stage> {
        self.stages.iter()
    }

    /// Index of the stage after `index`, wrapping to 0.
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.stages.len()
    }

    /// Length of one full cycle.
    pub fn cycle_duration(&self) -> Duration {
        Duration::seconds(self.stages.iter().map(|s| s.duration_secs as i64).sum())
    }

    /// Canonical setup string for this list. Parsing it yields an equal list.
    pub fn to_setup_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StageList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}, {}", stage.name, stage.duration_min())?;
            if !stage.message.is_empty() {
                write!(f, ", {}", stage.message)?;
            }
        }
        Ok(())
    }
}

impl FromStr for StageList {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'a> IntoIterator for &'a StageList {
    type Item = &'a Stage;
    type IntoIter = std::slice::Iter<'a, Stage>;

    fn into_iter(self) -> Self::IntoIter {
        self.stages.iter()
    }
}

fn parse_clause(clause: usize, raw: &str) -> Result<Stage, ParseError> {
    let fields: Vec<&str> = raw.split(',').map(str::trim).collect();
    if !(2..=3).contains(&fields.len()) {
        return Err(ParseError::FieldCount {
            clause,
            found: fields.len(),
        });
    }

    let name = fields[0];
    if name.is_empty() {
        return Err(ParseError::EmptyName { clause });
    }

    let minutes: u64 = fields[1]
        .parse()
        .ok()
        .filter(|m| *m > 0)
        .ok_or_else(|| ParseError::InvalidDuration {
            clause,
            value: fields[1].to_string(),
        })?;
    if minutes > MAX_STAGE_MINUTES {
        return Err(ParseError::DurationOutOfRange { clause, minutes });
    }

    Ok(Stage {
        name: name.to_string(),
        duration_secs: minutes * 60,
        message: fields.get(2).map(|m| m.to_string()).unwrap_or_default(),
    })
}
