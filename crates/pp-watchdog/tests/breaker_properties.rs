//! Property test for the circuit breaker FSM's acyclic invariant: within one
//! incident, the only transitions are `Closed -> Open -> HalfOpen -> Closed`
//! or `HalfOpen -> Open`; `Closed -> HalfOpen` never happens directly.

use std::time::{Duration, Instant};

use pp_config::CircuitBreakerConfig;
use pp_watchdog::breaker::{CircuitBreaker, CircuitState};
use proptest::prelude::*;

fn cfg() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        enabled: true,
        failure_threshold: 3,
        reset_timeout: Duration::from_millis(5),
        half_open_success_threshold: 2,
    }
}

proptest! {
    #[test]
    fn fsm_never_jumps_closed_to_half_open(
        outcomes in prop::collection::vec(any::<bool>(), 1..200),
        step_ms in 0u64..8,
    ) {
        let mut breaker = CircuitBreaker::new(cfg());
        let mut now = Instant::now();
        let mut prev = CircuitState::Closed;
        for success in outcomes {
            now += Duration::from_millis(step_ms);
            let transitions = if success {
                breaker.record_success(now)
            } else {
                breaker.record_failure(now)
            };
            for t in transitions {
                prop_assert_eq!(t.from, prev);
                let valid = matches!(
                    (t.from, t.to),
                    (CircuitState::Closed, CircuitState::Open)
                        | (CircuitState::Open, CircuitState::HalfOpen)
                        | (CircuitState::HalfOpen, CircuitState::Closed)
                        | (CircuitState::HalfOpen, CircuitState::Open)
                );
                prop_assert!(valid, "invalid transition {:?} -> {:?}", t.from, t.to);
                prev = t.to;
            }
            prop_assert_eq!(breaker.state(), prev);
        }
    }
}
