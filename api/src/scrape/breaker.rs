//! Per-source circuit breaker. No crate in the retrieval pack
//! implements this state machine, so it is hand-rolled: {closed, open,
//! half_open}, 5 consecutive failures opens for 60s, doubling up to 10min
//! on repeated half-open failure, single-probe admission while half-open.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const FAILURE_THRESHOLD: u32 = 5;
const INITIAL_COOLDOWN: Duration = Duration::from_secs(60);
const MAX_COOLDOWN: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct SourceState {
    state: State,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    cooldown: Duration,
    probe_in_flight: bool,
}

impl Default for SourceState {
    fn default() -> Self {
        Self { state: State::Closed, consecutive_failures: 0, opened_at: None, cooldown: INITIAL_COOLDOWN, probe_in_flight: false }
    }
}

pub struct CircuitBreaker {
    sources: Mutex<HashMap<String, SourceState>>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self { sources: Mutex::new(HashMap::new()) }
    }

    /// Returns `Ok(())` if the call should proceed (closed, or the single
    /// admitted half-open probe), `Err(BreakerOpen)` otherwise — the
    /// orchestrator treats this as a skip, not a failure.
    pub fn before_call(&self, source: &str) -> Result<(), crate::error::CoreError> {
        let mut sources = self.sources.lock().unwrap();
        let entry = sources.entry(source.to_string()).or_default();

        match entry.state {
            State::Closed => Ok(()),
            State::Open => {
                let opened_at = entry.opened_at.expect("open state always has opened_at");
                if opened_at.elapsed() >= entry.cooldown {
                    entry.state = State::HalfOpen;
                    entry.probe_in_flight = true;
                    Ok(())
                } else {
                    Err(crate::error::CoreError::BreakerOpen(source.to_string()))
                }
            }
            State::HalfOpen => {
                if entry.probe_in_flight {
                    Err(crate::error::CoreError::BreakerOpen(source.to_string()))
                } else {
                    entry.probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    pub fn record_success(&self, source: &str) {
        let mut sources = self.sources.lock().unwrap();
        let entry = sources.entry(source.to_string()).or_default();
        entry.state = State::Closed;
        entry.consecutive_failures = 0;
        entry.opened_at = None;
        entry.cooldown = INITIAL_COOLDOWN;
        entry.probe_in_flight = false;
    }

    pub fn record_failure(&self, source: &str) {
        let mut sources = self.sources.lock().unwrap();
        let entry = sources.entry(source.to_string()).or_default();

        match entry.state {
            State::HalfOpen => {
                entry.state = State::Open;
                entry.opened_at = Some(Instant::now());
                entry.cooldown = (entry.cooldown * 2).min(MAX_COOLDOWN);
                entry.probe_in_flight = false;
            }
            State::Closed => {
                entry.consecutive_failures += 1;
                if entry.consecutive_failures >= FAILURE_THRESHOLD {
                    entry.state = State::Open;
                    entry.opened_at = Some(Instant::now());
                    entry.cooldown = INITIAL_COOLDOWN;
                }
            }
            State::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_five_consecutive_failures() {
        let breaker = CircuitBreaker::new();
        for _ in 0..4 {
            breaker.before_call("nos.nl").unwrap();
            breaker.record_failure("nos.nl");
        }
        assert!(breaker.before_call("nos.nl").is_ok());
        breaker.record_failure("nos.nl");
        assert!(matches!(breaker.before_call("nos.nl"), Err(crate::error::CoreError::BreakerOpen(_))));
    }

    #[test]
    fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new();
        for _ in 0..4 {
            breaker.before_call("nos.nl").unwrap();
            breaker.record_failure("nos.nl");
        }
        breaker.before_call("nos.nl").unwrap();
        breaker.record_success("nos.nl");
        for _ in 0..4 {
            breaker.before_call("nos.nl").unwrap();
            breaker.record_failure("nos.nl");
        }
        assert!(breaker.before_call("nos.nl").is_ok(), "breaker should not have tripped yet after reset");
    }

    #[test]
    fn half_open_admits_exactly_one_probe() {
        let breaker = CircuitBreaker::new();
        {
            let mut sources = breaker.sources.lock().unwrap();
            let entry = sources.entry("nos.nl".to_string()).or_default();
            entry.state = State::Open;
            entry.opened_at = Some(Instant::now() - Duration::from_secs(61));
            entry.cooldown = INITIAL_COOLDOWN;
        }
        assert!(breaker.before_call("nos.nl").is_ok());
        assert!(matches!(breaker.before_call("nos.nl"), Err(crate::error::CoreError::BreakerOpen(_))));
    }
}
