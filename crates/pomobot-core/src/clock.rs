//! Clock abstraction for testable time handling.
//!
//! All deadline and clocked-time math goes through [`Clock::now`]. The
//! system clock anchors a wall-clock reading once and advances it with a
//! monotonic [`Instant`], so successive readings never go backwards even if
//! the host clock is adjusted.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

/// A clock that provides the current time.
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Real system clock, monotonic from the moment it was created.
#[derive(Clone)]
pub struct SystemClock {
    anchor_wall: DateTime<Utc>,
    anchor_mono: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            anchor_wall: Utc::now(),
            anchor_mono: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Duration::from_std(self.anchor_mono.elapsed()).unwrap_or(Duration::MAX);
        self.anchor_wall
            .checked_add_signed(elapsed)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Fake clock for testing with controllable time.
///
/// Clones share the same underlying instant.
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::at(DateTime::<Utc>::UNIX_EPOCH + Duration::days(20_000))
    }

    /// Start the clock at a specific instant.
    pub fn at(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock();
        *current += duration;
    }

    /// Advance the clock by whole seconds.
    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_never_goes_backwards() {
        let clock = SystemClock::new();
        let t1 = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let t2 = clock.now();
        assert!(t2 >= t1);
    }

    #[test]
    fn fake_clock_can_be_advanced() {
        let clock = FakeClock::new();
        let t1 = clock.now();
        clock.advance(Duration::seconds(60));
        assert_eq!(clock.now() - t1, Duration::seconds(60));
    }

    #[test]
    fn fake_clock_is_cloneable_and_shared() {
        let clock1 = FakeClock::new();
        let clock2 = clock1.clone();
        let t1 = clock1.now();
        clock2.advance_secs(30);
        assert_eq!(clock1.now() - t1, Duration::seconds(30));
    }
}
