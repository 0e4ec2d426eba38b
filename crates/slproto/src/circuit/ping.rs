// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Liveness tracking. Two consecutive missed ping windows mark the
//! simulator a disconnect candidate; a third confirms disconnect.

use std::time::{Duration, Instant};

pub struct PingTracker {
    next_id: u8,
    outstanding: Option<(u8, Instant)>,
    last_lag: Duration,
    missed_windows: u32,
}

impl PingTracker {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            outstanding: None,
            last_lag: Duration::from_millis(500),
            missed_windows: 0,
        }
    }

    /// Begin a new ping window, returning the id to send in
    /// `StartPingCheck`.
    pub fn start(&mut self, now: Instant) -> u8 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.outstanding = Some((id, now));
        id
    }

    /// Record a `CompletePingCheck` reply. Returns the measured lag when
    /// the id matches the outstanding ping.
    pub fn complete(&mut self, id: u8, now: Instant) -> Option<Duration> {
        let (outstanding_id, sent_at) = self.outstanding?;
        if outstanding_id != id {
            return None;
        }
        self.outstanding = None;
        self.missed_windows = 0;
        let lag = now.saturating_duration_since(sent_at);
        self.last_lag = lag;
        Some(lag)
    }

    /// Call once per ping window elapsing without a matching reply.
    pub fn mark_window_missed(&mut self) {
        if self.outstanding.is_some() {
            self.missed_windows += 1;
        }
    }

    pub fn last_lag(&self) -> Duration {
        self.last_lag
    }

    /// Whether a ping is outstanding and has been so for at least
    /// `window`, i.e. it is due to be counted as missed.
    pub fn window_elapsed(&self, now: Instant, window: Duration) -> bool {
        match self.outstanding {
            Some((_, sent_at)) => now.saturating_duration_since(sent_at) >= window,
            None => false,
        }
    }

    pub fn has_outstanding(&self) -> bool {
        self.outstanding.is_some()
    }

    pub fn is_disconnect_candidate(&self) -> bool {
        self.missed_windows >= 2
    }

    pub fn is_confirmed_disconnect(&self) -> bool {
        self.missed_windows >= 3
    }
}

impl Default for PingTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_requires_matching_id() {
        let mut tracker = PingTracker::new();
        let now = Instant::now();
        let id = tracker.start(now);
        assert!(tracker.complete(id.wrapping_add(1), now).is_none());
        assert!(tracker.complete(id, now).is_some());
    }

    #[test]
    fn missed_windows_escalate_to_confirmed_disconnect() {
        let mut tracker = PingTracker::new();
        tracker.start(Instant::now());
        assert!(!tracker.is_disconnect_candidate());
        tracker.mark_window_missed();
        assert!(!tracker.is_disconnect_candidate());
        tracker.mark_window_missed();
        assert!(tracker.is_disconnect_candidate());
        assert!(!tracker.is_confirmed_disconnect());
        tracker.mark_window_missed();
        assert!(tracker.is_confirmed_disconnect());
    }
}
