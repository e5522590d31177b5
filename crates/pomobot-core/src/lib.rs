//! # pomobot Core Library
//!
//! Group Pomodoro timers for chat channels. Each channel can host several
//! named groups; members subscribe to one group at a time, and every group
//! cycles through its stages until someone stops it.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based state machine per group that
//!   requires the caller to periodically invoke `tick()` for progress
//! - **Ledger**: Per-group subscription sessions and clocked time
//! - **Registry**: All groups, indexed by channel and guild, enforcing one
//!   subscription per member
//! - **Scheduler**: One polling loop ticking every running group
//! - **Storage**: TOML-based configuration
//!
//! ## Key Components
//!
//! - [`GroupTimer`]: Core timer state machine
//! - [`TimerRegistry`]: Group ownership and member subscriptions
//! - [`Scheduler`]: Stage-boundary detection and notification dispatch
//! - [`TimerService`]: The engine as one owned object for a command layer
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod ids;
pub mod ledger;
pub mod notify;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod storage;
pub mod timer;

pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{ConfigError, CoreError, LedgerError, ParseError, RegistryError, TimerError};
pub use events::{EntryCause, Event, StageEntry};
pub use ids::{ChannelId, GuildId, MemberId, TimerId};
pub use ledger::{Session, SessionRecord, SubscriptionLedger};
pub use notify::{ChannelSink, NotificationSink, TracingSink};
pub use registry::{Group, TimerMatch, TimerRegistry};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use service::TimerService;
pub use storage::Config;
pub use timer::{format_hms, GroupTimer, Stage, StageList, TimerSnapshot, TimerState, DEFAULT_SETUP};
