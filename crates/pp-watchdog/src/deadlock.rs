//! Deadlock suspicion via heartbeat-miss counting.
//!
//! The contract's source material ties detection to a process-wide
//! goroutine count; `tokio` has no equivalent census, so this reimplements
//! the same intent — "a component has stopped making progress" — on the
//! signal the runtime actually exposes: an explicit `heartbeat()` call each
//! component's tick loop is expected to make once per cycle. A component
//! that misses `miss_threshold` consecutive expected heartbeats, and whose
//! last heartbeat is older than `max_operation_time`, is suspected stuck.

use std::time::{Duration, Instant};

use pp_config::DeadlockConfig;

#[derive(Debug, Clone)]
pub struct HeartbeatTracker {
    config: DeadlockConfig,
    last_heartbeat: Instant,
    last_check: Instant,
    consecutive_misses: u32,
}

impl HeartbeatTracker {
    pub fn new(config: DeadlockConfig, now: Instant) -> Self {
        Self { config, last_heartbeat: now, last_check: now, consecutive_misses: 0 }
    }

    pub fn update_config(&mut self, config: DeadlockConfig) {
        self.config = config;
    }

    /// Called whenever the component reports liveness.
    pub fn heartbeat(&mut self, now: Instant) {
        self.last_heartbeat = now;
        self.consecutive_misses = 0;
    }

    pub fn last_heartbeat(&self) -> Instant {
        self.last_heartbeat
    }

    /// Called once per watchdog monitor tick. Returns `true` the first
    /// time a miss pushes `consecutive_misses` to `miss_threshold` (so the
    /// caller raises exactly one incident per stuck episode, not one per
    /// tick for as long as the component stays stuck).
    pub fn check(&mut self, now: Instant) -> bool {
        if !self.config.enabled {
            return false;
        }
        if now.duration_since(self.last_check) < self.config.heartbeat_interval {
            return false;
        }
        self.last_check = now;

        let idle = now.saturating_duration_since(self.last_heartbeat);
        if idle <= self.config.heartbeat_interval {
            self.consecutive_misses = 0;
            return false;
        }

        self.consecutive_misses += 1;
        let stuck = self.consecutive_misses >= self.config.miss_threshold
            && idle >= self.config.max_operation_time;
        // Only fire once per episode: a heartbeat() call resets the miss
        // counter, so this guard only matters while the component stays
        // silent tick after tick.
        stuck && self.consecutive_misses == self.config.miss_threshold
    }

    pub fn consecutive_misses(&self) -> u32 {
        self.consecutive_misses
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_heartbeat)
    }
}
