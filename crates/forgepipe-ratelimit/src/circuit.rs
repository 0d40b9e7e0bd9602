//! Circuit breaker state machine: `closed -> open -> half-open -> {closed, open}`.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

pub struct CircuitBreaker {
    state: CircuitState,
    error_threshold: f64,
    cooldown: Duration,
    opened_at: Option<Instant>,
    window: Vec<bool>,
    window_cap: usize,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(error_threshold: f64, cooldown: Duration) -> Self {
        Self {
            state: CircuitState::Closed,
            error_threshold,
            cooldown,
            opened_at: None,
            window: Vec::new(),
            window_cap: forgepipe_core::provider_health::WINDOW_SIZE,
        }
    }

    /// Whether an admission attempt should be allowed right now. A call on
    /// an `Open` circuit past its cooldown transitions to `HalfOpen` and
    /// allows exactly the probe that called this.
    pub fn allow_attempt(&mut self) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = self.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.cooldown {
                    self.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_outcome(&mut self, success: bool) {
        match self.state {
            CircuitState::HalfOpen => {
                if success {
                    self.close();
                } else {
                    self.open();
                }
            }
            CircuitState::Closed => {
                self.push_window(success);
                if self.window_error_rate() >= self.error_threshold
                    && self.window.len() >= self.window_cap
                {
                    self.open();
                }
            }
            CircuitState::Open => {
                // A call should not have been admitted while open; ignore.
            }
        }
    }

    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.state
    }

    fn push_window(&mut self, success: bool) {
        if self.window.len() == self.window_cap {
            self.window.remove(0);
        }
        self.window.push(success);
    }

    fn window_error_rate(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let failures = self.window.iter().filter(|ok| !**ok).count();
        failures as f64 / self.window.len() as f64
    }

    fn open(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.opened_at = None;
        self.window.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_circuit_allows_attempts() {
        let mut breaker = CircuitBreaker::new(0.5, Duration::from_secs(30));
        assert!(breaker.allow_attempt());
    }

    #[test]
    fn sustained_failures_open_the_circuit() {
        let mut breaker = CircuitBreaker::new(0.5, Duration::from_secs(30));
        for _ in 0..10 {
            breaker.record_outcome(false);
        }
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn open_circuit_denies_until_cooldown_elapses() {
        let mut breaker = CircuitBreaker::new(0.5, Duration::from_millis(20));
        for _ in 0..10 {
            breaker.record_outcome(false);
        }
        assert!(!breaker.allow_attempt());
        std::thread::sleep(Duration::from_millis(30));
        assert!(breaker.allow_attempt());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_probe_success_closes_the_circuit() {
        let mut breaker = CircuitBreaker::new(0.5, Duration::from_millis(5));
        for _ in 0..10 {
            breaker.record_outcome(false);
        }
        std::thread::sleep(Duration::from_millis(10));
        assert!(breaker.allow_attempt());
        breaker.record_outcome(true);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_probe_failure_reopens_the_circuit() {
        let mut breaker = CircuitBreaker::new(0.5, Duration::from_millis(5));
        for _ in 0..10 {
            breaker.record_outcome(false);
        }
        std::thread::sleep(Duration::from_millis(10));
        assert!(breaker.allow_attempt());
        breaker.record_outcome(false);
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    impl CircuitBreaker {
        fn allow_attempt_without_cooldown_check(&self) -> bool {
            self.state != CircuitState::Open
        }
    }
}
