//! Identifier newtypes.
//!
//! Chat-platform ids (members, channels, guilds) are opaque 64-bit
//! snowflakes handed to us by the command layer. Timer ids are minted here.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

snowflake_id!(
    /// A chat member.
    MemberId
);
snowflake_id!(
    /// A text channel. Every group timer is bound to exactly one.
    ChannelId
);
snowflake_id!(
    /// A guild (server) grouping channels.
    GuildId
);

/// Stable identity of a group timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(Uuid);

impl TimerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TimerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
