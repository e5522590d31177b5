mod engine;
mod render;
mod stages;

pub use engine::{GroupTimer, MemberClock, TimerSnapshot, TimerState};
pub use render::format_hms;
pub use stages::{Stage, StageList, DEFAULT_SETUP};
