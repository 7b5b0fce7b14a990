//! The per-component circuit-breaker FSM: `Closed -> Open -> HalfOpen ->
//! Closed | Open`, never `Closed -> HalfOpen` directly. `Open -> HalfOpen`
//! happens lazily: the breaker only notices `open_until` has elapsed the
//! next time it is asked to record an outcome, rather than running its own
//! timer task.

use std::time::{Duration, Instant};

use pp_config::CircuitBreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        write!(f, "{s}")
    }
}

/// A state change the caller should turn into a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitTransition {
    pub from: CircuitState,
    pub to: CircuitState,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    open_until: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            open_until: None,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn open_until(&self) -> Option<Instant> {
        self.open_until
    }

    pub fn update_config(&mut self, config: CircuitBreakerConfig) {
        self.config = config;
    }

    /// Move `Open -> HalfOpen` if `reset_timeout` has elapsed. Call before
    /// every `record_success`/`record_failure` so an in-flight check always
    /// observes the current state rather than a stale `Open`.
    fn poll_timeout(&mut self, now: Instant) -> Option<CircuitTransition> {
        if self.state == CircuitState::Open {
            if let Some(until) = self.open_until {
                if now >= until {
                    let from = self.state;
                    self.state = CircuitState::HalfOpen;
                    self.consecutive_successes = 0;
                    self.consecutive_failures = 0;
                    self.open_until = None;
                    return Some(CircuitTransition { from, to: self.state });
                }
            }
        }
        None
    }

    fn open(&mut self, now: Instant) -> CircuitTransition {
        let from = self.state;
        self.state = CircuitState::Open;
        self.open_until = Some(now + self.config.reset_timeout);
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        CircuitTransition { from, to: self.state }
    }

    /// Record a non-breaching observation. Returns every state transition
    /// that occurred, in order (at most one: the lazy `Open -> HalfOpen`
    /// check and the outcome of this success cannot both fire, since a
    /// fresh `HalfOpen` still needs its own successes counted).
    pub fn record_success(&mut self, now: Instant) -> Vec<CircuitTransition> {
        if !self.config.enabled {
            return Vec::new();
        }
        let mut transitions = Vec::new();
        if let Some(t) = self.poll_timeout(now) {
            transitions.push(t);
        }
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                self.consecutive_successes += 1;
                if self.consecutive_successes >= self.config.half_open_success_threshold {
                    let from = self.state;
                    self.state = CircuitState::Closed;
                    self.consecutive_failures = 0;
                    self.consecutive_successes = 0;
                    transitions.push(CircuitTransition { from, to: self.state });
                }
            }
            CircuitState::Open => {
                // Still inside `open_until`; nothing to record yet.
            }
        }
        transitions
    }

    /// Record a breaching observation.
    pub fn record_failure(&mut self, now: Instant) -> Vec<CircuitTransition> {
        if !self.config.enabled {
            return Vec::new();
        }
        let mut transitions = Vec::new();
        if let Some(t) = self.poll_timeout(now) {
            transitions.push(t);
        }
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.config.failure_threshold {
                    transitions.push(self.open(now));
                }
            }
            CircuitState::HalfOpen => {
                // Any failure during the probe reopens the circuit.
                transitions.push(self.open(now));
            }
            CircuitState::Open => {
                // Already open; extend nothing, `open_until` is fixed at
                // the moment the circuit tripped.
            }
        }
        transitions
    }

    /// Whether an operation is currently permitted. `HalfOpen` allows
    /// exactly one trial at a time; callers that serialize their checks
    /// per component (as the watchdog's monitor loop does) get this for
    /// free without needing a separate in-flight flag.
    pub fn allows_operation(&self) -> bool {
        self.state != CircuitState::Open
    }

    pub fn time_until_half_open(&self, now: Instant) -> Option<Duration> {
        self.open_until.map(|until| until.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            enabled: true,
            failure_threshold: 3,
            reset_timeout: Duration::from_millis(50),
            half_open_success_threshold: 2,
        }
    }

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let mut b = CircuitBreaker::new(cfg());
        let now = Instant::now();
        assert!(b.record_failure(now).is_empty());
        assert!(b.record_failure(now).is_empty());
        let transitions = b.record_failure(now);
        assert_eq!(transitions, vec![CircuitTransition { from: CircuitState::Closed, to: CircuitState::Open }]);
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[test]
    fn success_resets_failure_count_in_closed() {
        let mut b = CircuitBreaker::new(cfg());
        let now = Instant::now();
        b.record_failure(now);
        b.record_failure(now);
        b.record_success(now);
        b.record_failure(now);
        b.record_failure(now);
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[test]
    fn transitions_to_half_open_after_timeout_then_closed_on_probe_success() {
        let mut b = CircuitBreaker::new(cfg());
        let t0 = Instant::now();
        b.record_failure(t0);
        b.record_failure(t0);
        b.record_failure(t0);
        assert_eq!(b.state(), CircuitState::Open);

        let t1 = t0 + Duration::from_millis(60);
        let transitions = b.record_success(t1);
        assert_eq!(transitions[0].to, CircuitState::HalfOpen);
        assert_eq!(b.state(), CircuitState::HalfOpen);

        let transitions = b.record_success(t1);
        assert_eq!(transitions, vec![CircuitTransition { from: CircuitState::HalfOpen, to: CircuitState::Closed }]);
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_probe_failure_reopens() {
        let mut b = CircuitBreaker::new(cfg());
        let t0 = Instant::now();
        b.record_failure(t0);
        b.record_failure(t0);
        b.record_failure(t0);
        let t1 = t0 + Duration::from_millis(60);
        b.record_success(t1); // Closed -> Open(lazy) -> HalfOpen
        assert_eq!(b.state(), CircuitState::HalfOpen);
        let transitions = b.record_failure(t1);
        assert_eq!(transitions.last().unwrap().to, CircuitState::Open);
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[test]
    fn disabled_breaker_never_transitions() {
        let mut b = CircuitBreaker::new(CircuitBreakerConfig { enabled: false, ..cfg() });
        let now = Instant::now();
        for _ in 0..10 {
            assert!(b.record_failure(now).is_empty());
        }
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[test]
    fn never_transitions_directly_from_closed_to_half_open() {
        let mut b = CircuitBreaker::new(cfg());
        let now = Instant::now();
        let transitions = b.record_success(now);
        assert!(transitions.is_empty());
        assert_eq!(b.state(), CircuitState::Closed);
    }
}
