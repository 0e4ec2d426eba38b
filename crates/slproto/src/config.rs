// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runtime-tunable engine options. Values are held behind an `ArcSwap` so
//! a running engine can be reconfigured from another thread without a
//! lock on the hot send/receive path.

use std::time::Duration;

use arc_swap::ArcSwap;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// How long a circuit may go without any inbound packet before it is
    /// declared dead.
    pub simulator_timeout: Duration,
    /// How long to wait for a `LogoutReply` before giving up and tearing
    /// the circuit down locally.
    pub logout_timeout: Duration,
    /// Whether the engine sends `AgentUpdate` automatically on its
    /// maintenance tick, or leaves that entirely to the caller.
    pub send_agent_updates: bool,
    /// Whether the engine negotiates a throttle on connect.
    pub send_agent_throttle: bool,
    /// Whether more than one concurrent circuit is permitted.
    pub multiple_sims: bool,
    /// Base retransmission timeout before exponential backoff.
    pub resend_timeout_ms: u64,
    /// Attempts (including the first send) before a reliable packet is
    /// abandoned.
    pub max_resend_attempts: u32,
    /// How often queued acks are flushed as a standalone `PacketAck` if
    /// they have not already been piggybacked.
    pub ack_flush_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simulator_timeout: Duration::from_secs(30),
            logout_timeout: Duration::from_secs(5),
            send_agent_updates: true,
            send_agent_throttle: true,
            multiple_sims: true,
            resend_timeout_ms: 4000,
            max_resend_attempts: 3,
            ack_flush_ms: 500,
        }
    }
}

impl Config {
    pub fn resend_timeout(&self) -> Duration {
        Duration::from_millis(self.resend_timeout_ms)
    }

    pub fn ack_flush_interval(&self) -> Duration {
        Duration::from_millis(self.ack_flush_ms)
    }
}

/// Shared, hot-swappable configuration handle. Cloning is cheap (an `Arc`
/// bump); callers hold one per engine instance.
#[derive(Clone)]
pub struct SharedConfig(std::sync::Arc<ArcSwap<Config>>);

impl SharedConfig {
    pub fn new(config: Config) -> Self {
        Self(std::sync::Arc::new(ArcSwap::from_pointee(config)))
    }

    pub fn load(&self) -> Config {
        (**self.0.load()).clone()
    }

    pub fn store(&self, config: Config) {
        self.0.store(std::sync::Arc::new(config));
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_is_visible_to_other_handles() {
        let shared = SharedConfig::default();
        let other = shared.clone();
        let mut updated = other.load();
        updated.send_agent_throttle = false;
        other.store(updated);
        assert!(!shared.load().send_agent_throttle);
    }
}
