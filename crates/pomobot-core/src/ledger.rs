//! Per-timer subscription ledger.
//!
//! Tracks which members are subscribed to one group timer and since when.
//! Clocked time runs from join to leave, whether or not the timer itself is
//! running in between.

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::ids::{MemberId, TimerId};

/// An open subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub joined_at: DateTime<Utc>,
}

/// A closed subscription, handed back on leave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub member_id: MemberId,
    pub timer_id: TimerId,
    pub joined_at: DateTime<Utc>,
    pub left_at: DateTime<Utc>,
    pub clocked_secs: u64,
}

impl SessionRecord {
    pub fn clocked(&self) -> Duration {
        Duration::seconds(self.clocked_secs as i64)
    }
}

#[derive(Debug, Clone)]
pub struct SubscriptionLedger {
    timer_id: TimerId,
    sessions: IndexMap<MemberId, Session>,
}

impl SubscriptionLedger {
    pub fn new(timer_id: TimerId) -> Self {
        Self {
            timer_id,
            sessions: IndexMap::new(),
        }
    }

    /// Open a session for `member` starting at `now`.
    pub fn join(&mut self, member: MemberId, now: DateTime<Utc>) -> Result<(), LedgerError> {
        if self.sessions.contains_key(&member) {
            return Err(LedgerError::AlreadyJoined);
        }
        self.sessions.insert(member, Session { joined_at: now });
        tracing::debug!(timer = %self.timer_id, member = %member, "member joined");
        Ok(())
    }

    /// Close `member`'s session and report how long it lasted.
    pub fn leave(
        &mut self,
        member: MemberId,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord, LedgerError> {
        let session = self
            .sessions
            .shift_remove(&member)
            .ok_or(LedgerError::NotJoined)?;
        let record = SessionRecord {
            member_id: member,
            timer_id: self.timer_id,
            joined_at: session.joined_at,
            left_at: now,
            clocked_secs: elapsed_secs(session.joined_at, now),
        };
        tracing::debug!(
            timer = %self.timer_id,
            member = %member,
            clocked_secs = record.clocked_secs,
            "member left"
        );
        Ok(record)
    }

    pub fn contains(&self, member: MemberId) -> bool {
        self.sessions.contains_key(&member)
    }

    /// Time clocked so far by a currently subscribed member.
    pub fn clocked(&self, member: MemberId, now: DateTime<Utc>) -> Option<Duration> {
        self.sessions
            .get(&member)
            .map(|s| Duration::seconds(elapsed_secs(s.joined_at, now) as i64))
    }

    /// Subscribed members in join order.
    pub fn members(&self) -> impl Iterator<Item = (MemberId, &Session)> + '_ {
        self.sessions.iter().map(|(id, s)| (*id, s))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Whole seconds from `from` to `to`, never negative.
fn elapsed_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_seconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(1_700_000_000 + secs)
    }

    #[test]
    fn leave_reports_clocked_time() {
        let mut ledger = SubscriptionLedger::new(TimerId::new());
        ledger.join(MemberId(1), t(0)).unwrap();
        let record = ledger.leave(MemberId(1), t(90)).unwrap();
        assert_eq!(record.clocked_secs, 90);
        assert_eq!(record.joined_at, t(0));
        assert_eq!(record.left_at, t(90));
        assert!(ledger.is_empty());
    }

    #[test]
    fn double_join_is_rejected_without_resetting_the_clock() {
        let mut ledger = SubscriptionLedger::new(TimerId::new());
        ledger.join(MemberId(1), t(0)).unwrap();
        assert_eq!(ledger.join(MemberId(1), t(30)), Err(LedgerError::AlreadyJoined));
        assert_eq!(ledger.leave(MemberId(1), t(60)).unwrap().clocked_secs, 60);
    }

    #[test]
    fn leave_without_join_fails() {
        let mut ledger = SubscriptionLedger::new(TimerId::new());
        assert_eq!(ledger.leave(MemberId(9), t(0)), Err(LedgerError::NotJoined));
    }

    #[test]
    fn clocked_time_never_negative() {
        let mut ledger = SubscriptionLedger::new(TimerId::new());
        ledger.join(MemberId(1), t(100)).unwrap();
        assert_eq!(ledger.leave(MemberId(1), t(50)).unwrap().clocked_secs, 0);
    }

    #[test]
    fn members_listed_in_join_order() {
        let mut ledger = SubscriptionLedger::new(TimerId::new());
        for id in [3, 1, 2] {
            ledger.join(MemberId(id), t(id as i64)).unwrap();
        }
        ledger.leave(MemberId(1), t(10)).unwrap();
        let order: Vec<_> = ledger.members().map(|(id, _)| id.0).collect();
        assert_eq!(order, vec![3, 2]);
        assert_eq!(ledger.clocked(MemberId(3), t(13)), Some(Duration::seconds(10)));
        assert_eq!(ledger.clocked(MemberId(1), t(13)), None);
    }
}
