// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Unacked-packet bookkeeping and RTO-driven retransmission.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::message::PacketType;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const MIN_RTO: Duration = Duration::from_millis(100);
pub const MAX_RTO: Duration = Duration::from_secs(60);

pub struct OutgoingRecord {
    pub bytes: Vec<u8>,
    pub sent_at: Instant,
    pub attempts: u32,
    pub packet_type: PacketType,
}

/// Per-circuit set of reliable packets awaiting acknowledgement. Invariant:
/// no two records share a sequence number while both are pending.
pub struct OutgoingSet {
    records: HashMap<u32, OutgoingRecord>,
    max_attempts: u32,
}

/// Resend-or-give-up decision for one pending record, evaluated by the
/// engine's retransmission tick.
pub enum RetransmitOutcome {
    Resend(u32, Vec<u8>),
    Exhausted(u32, PacketType),
}

impl OutgoingSet {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            records: HashMap::new(),
            max_attempts,
        }
    }

    pub fn insert(&mut self, sequence: u32, bytes: Vec<u8>, packet_type: PacketType, now: Instant) {
        self.records.insert(
            sequence,
            OutgoingRecord {
                bytes,
                sent_at: now,
                attempts: 1,
                packet_type,
            },
        );
    }

    /// Idempotent: acking an already-removed sequence is a no-op.
    pub fn ack(&mut self, sequence: u32) -> bool {
        self.records.remove(&sequence).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Scan for records whose RTO has elapsed. `rto` is clamped by the
    /// caller to `[MIN_RTO, MAX_RTO]` from measured ping lag with
    /// exponential backoff per attempt.
    pub fn due_for_retransmit(&mut self, now: Instant, rto: Duration) -> Vec<RetransmitOutcome> {
        let mut outcomes = Vec::new();
        let mut exhausted = Vec::new();
        for (sequence, record) in self.records.iter_mut() {
            let backoff = rto * 2u32.saturating_pow(record.attempts.saturating_sub(1));
            let backoff = backoff.clamp(MIN_RTO, MAX_RTO);
            if now.saturating_duration_since(record.sent_at) < backoff {
                continue;
            }
            if record.attempts >= self.max_attempts {
                exhausted.push(*sequence);
                outcomes.push(RetransmitOutcome::Exhausted(*sequence, record.packet_type));
                continue;
            }
            record.attempts += 1;
            record.sent_at = now;
            outcomes.push(RetransmitOutcome::Resend(*sequence, record.bytes.clone()));
        }
        for sequence in exhausted {
            self.records.remove(&sequence);
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::PacketType;

    #[test]
    fn ack_is_idempotent() {
        let mut set = OutgoingSet::new(DEFAULT_MAX_ATTEMPTS);
        set.insert(1, vec![1, 2, 3], PacketType::AgentUpdate, Instant::now());
        assert!(set.ack(1));
        assert!(!set.ack(1));
        assert!(set.is_empty());
    }

    #[test]
    fn scenario_retransmit_on_timeout() {
        let mut set = OutgoingSet::new(DEFAULT_MAX_ATTEMPTS);
        let sent_at = Instant::now() - Duration::from_secs(1);
        set.records.insert(
            7,
            OutgoingRecord {
                bytes: vec![9],
                sent_at,
                attempts: 1,
                packet_type: PacketType::AgentUpdate,
            },
        );
        let outcomes = set.due_for_retransmit(Instant::now(), Duration::from_millis(100));
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            RetransmitOutcome::Resend(seq, bytes) => {
                assert_eq!(*seq, 7);
                assert_eq!(bytes, &vec![9]);
            }
            RetransmitOutcome::Exhausted(..) => panic!("expected resend, not exhaustion"),
        }
        assert_eq!(set.records.get(&7).unwrap().attempts, 2);
    }

    #[test]
    fn exhaustion_after_max_attempts_removes_record() {
        let mut set = OutgoingSet::new(2);
        let sent_at = Instant::now() - Duration::from_secs(10);
        set.records.insert(
            3,
            OutgoingRecord {
                bytes: vec![],
                sent_at,
                attempts: 2,
                packet_type: PacketType::AgentUpdate,
            },
        );
        let outcomes = set.due_for_retransmit(Instant::now(), Duration::from_millis(10));
        assert!(matches!(outcomes[0], RetransmitOutcome::Exhausted(3, PacketType::AgentUpdate)));
        assert!(set.is_empty());
    }
}
