//! Restart policy: exponential backoff over repeated restart attempts of a
//! `Restartable` component whose circuit has opened.

use std::time::{Duration, Instant};

use pp_config::RestartConfig;

#[derive(Debug, Clone)]
pub struct RestartState {
    config: RestartConfig,
    attempts: u32,
    backoff: Duration,
    next_eligible: Option<Instant>,
}

impl RestartState {
    pub fn new(config: RestartConfig) -> Self {
        let backoff = config.backoff_initial;
        Self { config, attempts: 0, backoff, next_eligible: None }
    }

    pub fn update_config(&mut self, config: RestartConfig) {
        self.backoff = self.backoff.min(config.backoff_max).max(config.backoff_initial);
        self.config = config;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn current_backoff(&self) -> Duration {
        self.backoff
    }

    /// Whether a restart attempt is permitted right now: enabled, under
    /// `max_attempts`, and past the backoff window armed by the last
    /// failure.
    pub fn eligible(&self, now: Instant) -> bool {
        if !self.config.enabled {
            return false;
        }
        if self.attempts >= self.config.max_attempts {
            return false;
        }
        match self.next_eligible {
            Some(t) => now >= t,
            None => true,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.attempts >= self.config.max_attempts
    }

    /// A started component reported success: reset to the clean state.
    pub fn record_success(&mut self) {
        self.attempts = 0;
        self.backoff = self.config.backoff_initial;
        self.next_eligible = None;
    }

    /// A restart attempt failed. Increments the attempt counter, multiplies
    /// backoff by `backoff_factor` (capped at `backoff_max`), and arms the
    /// next eligible instant.
    pub fn record_failure(&mut self, now: Instant) {
        self.attempts += 1;
        let scaled = self.backoff.mul_f64(self.config.backoff_factor);
        self.backoff = scaled.min(self.config.backoff_max);
        self.next_eligible = Some(now + self.backoff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> RestartConfig {
        RestartConfig {
            enabled: true,
            graceful_shutdown_timeout: Duration::from_secs(1),
            max_attempts: 3,
            backoff_initial: Duration::from_millis(10),
            backoff_max: Duration::from_millis(100),
            backoff_factor: 2.0,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut r = RestartState::new(cfg());
        let t0 = Instant::now();
        r.record_failure(t0);
        assert_eq!(r.current_backoff(), Duration::from_millis(20));
        r.record_failure(t0);
        assert_eq!(r.current_backoff(), Duration::from_millis(40));
        r.record_failure(t0);
        // third failure exhausts max_attempts (3), but backoff math still runs
        assert_eq!(r.current_backoff(), Duration::from_millis(80));
    }

    #[test]
    fn exhausts_after_max_attempts() {
        let mut r = RestartState::new(cfg());
        let t0 = Instant::now();
        r.record_failure(t0);
        r.record_failure(t0);
        r.record_failure(t0);
        assert!(r.exhausted());
        assert!(!r.eligible(t0 + Duration::from_secs(10)));
    }

    #[test]
    fn not_eligible_until_backoff_elapses() {
        let mut r = RestartState::new(cfg());
        let t0 = Instant::now();
        r.record_failure(t0);
        assert!(!r.eligible(t0));
        assert!(r.eligible(t0 + Duration::from_millis(25)));
    }

    #[test]
    fn success_resets_attempts_and_backoff() {
        let mut r = RestartState::new(cfg());
        let t0 = Instant::now();
        r.record_failure(t0);
        r.record_failure(t0);
        r.record_success();
        assert_eq!(r.attempts(), 0);
        assert_eq!(r.current_backoff(), Duration::from_millis(10));
        assert!(r.eligible(t0));
    }

    #[test]
    fn disabled_restart_is_never_eligible() {
        let r = RestartState::new(RestartConfig { enabled: false, ..cfg() });
        assert!(!r.eligible(Instant::now()));
    }
}
