// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Circuit Breaker
//!
//! One breaker per project, gating `SyncEngine::sync_project` calls.
//! Closed/Open/Half-Open state machine per §4.6 of the specification.

use codesync_domain::SyncError;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout: Duration,
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, timeout: Duration::from_secs(300), half_open_max_calls: 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: State,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    half_open_calls: u32,
}

/// A guard returned by `try_acquire`. Call `on_success` or `on_failure` to
/// report the outcome of the guarded call back to the breaker.
pub struct CallGuard<'a> {
    breaker: &'a CircuitBreaker,
}

impl CallGuard<'_> {
    pub fn on_success(self) {
        self.breaker.record_success();
    }

    pub fn on_failure(self) {
        self.breaker.record_failure();
    }
}

pub struct CircuitBreaker {
    project_id: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(project_id: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            project_id: project_id.into(),
            config,
            inner: Mutex::new(Inner { state: State::Closed, failure_count: 0, last_failure_time: None, half_open_calls: 0 }),
        }
    }

    /// Attempts to admit a call. On rejection, returns the `circuit_breaker`
    /// category error without touching the guarded call.
    pub fn try_acquire(&self) -> Result<CallGuard<'_>, SyncError> {
        let mut inner = self.inner.lock();
        match inner.state {
            State::Closed => Ok(CallGuard { breaker: self }),
            State::Open => {
                let elapsed = inner.last_failure_time.map(|t| t.elapsed()).unwrap_or(Duration::ZERO);
                if elapsed > self.config.timeout {
                    inner.state = State::HalfOpen;
                    inner.half_open_calls = 1;
                    Ok(CallGuard { breaker: self })
                } else {
                    Err(SyncError::CircuitOpen { project_id: self.project_id.clone() })
                }
            }
            State::HalfOpen => {
                if inner.half_open_calls < self.config.half_open_max_calls {
                    inner.half_open_calls += 1;
                    Ok(CallGuard { breaker: self })
                } else {
                    Err(SyncError::CircuitOpen { project_id: self.project_id.clone() })
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.state = State::Closed;
        inner.failure_count = 0;
        inner.half_open_calls = 0;
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            State::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = State::Open;
                    inner.last_failure_time = Some(Instant::now());
                }
            }
            State::HalfOpen => {
                inner.state = State::Open;
                inner.last_failure_time = Some(Instant::now());
                inner.half_open_calls = 0;
            }
            State::Open => {}
        }
    }

    #[cfg(test)]
    fn is_open(&self) -> bool {
        self.inner.lock().state == State::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_failure_threshold() {
        let cb = CircuitBreaker::new("p1", CircuitBreakerConfig { failure_threshold: 3, ..Default::default() });
        for _ in 0..3 {
            cb.try_acquire().unwrap().on_failure();
        }
        assert!(cb.is_open());
        assert!(matches!(cb.try_acquire(), Err(SyncError::CircuitOpen { .. })));
    }

    #[test]
    fn half_open_success_closes_and_resets() {
        let cb = CircuitBreaker::new(
            "p1",
            CircuitBreakerConfig { failure_threshold: 1, timeout: Duration::from_millis(1), half_open_max_calls: 1 },
        );
        cb.try_acquire().unwrap().on_failure();
        assert!(cb.is_open());
        std::thread::sleep(Duration::from_millis(5));
        let guard = cb.try_acquire().expect("half-open should admit one call");
        guard.on_success();
        assert!(!cb.is_open());
    }

    #[test]
    fn half_open_failure_reopens() {
        let cb = CircuitBreaker::new(
            "p1",
            CircuitBreakerConfig { failure_threshold: 1, timeout: Duration::from_millis(1), half_open_max_calls: 1 },
        );
        cb.try_acquire().unwrap().on_failure();
        std::thread::sleep(Duration::from_millis(5));
        cb.try_acquire().unwrap().on_failure();
        assert!(cb.is_open());
    }
}
