//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: upstream assumed down, requests fail fast
//! - Half-Open: a bounded number of probes test whether the upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold
//! Open → Half-Open: first permission request after the open duration
//! Half-Open → Closed: any probe succeeds
//! Half-Open → Open: any probe fails
//! ```
//!
//! # Design Decisions
//! - One breaker per upstream dependency (not per client)
//! - State and half-open in-flight count share one atomic word, so every
//!   transition is a single compare-and-set
//! - Permits are RAII guards; a permit dropped without an outcome counts as
//!   a failure, so cancelled callers never leak a probe slot

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

const STATE_SHIFT: u32 = 32;
const IN_FLIGHT_MASK: u64 = 0xFFFF_FFFF;

/// Circuit State enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(val: u8) -> Self {
        match val {
            0 => CircuitState::Closed,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Open,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        };
        f.write_str(s)
    }
}

/// Permission was denied; no upstream attempt should be made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("circuit breaker is {state}; failing fast")]
pub struct BreakerRejected {
    /// State the breaker was in when it refused the call.
    pub state: CircuitState,
}

fn pack(state: CircuitState, in_flight: u32) -> u64 {
    ((state as u64) << STATE_SHIFT) | u64::from(in_flight)
}

fn unpack(word: u64) -> (CircuitState, u32) {
    let state = CircuitState::from((word >> STATE_SHIFT) as u8);
    (state, (word & IN_FLIGHT_MASK) as u32)
}

/// Tri-state gate guarding one upstream dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    open_duration: Duration,
    half_open_permits: u32,

    /// Packed (state, half-open in-flight count).
    word: AtomicU64,
    consecutive_failures: AtomicU32,
    /// Nanoseconds since `epoch` of the last transition into Open.
    opened_at: AtomicU64,
    epoch: Instant,
}

impl CircuitBreaker {
    /// Create a new breaker in the Closed state.
    pub fn new(
        name: impl Into<String>,
        failure_threshold: u32,
        open_duration: Duration,
        half_open_permits: u32,
    ) -> Self {
        let name = name.into();
        tracing::info!(
            target_name = %name,
            failure_threshold,
            open_duration_ms = open_duration.as_millis() as u64,
            half_open_permits,
            "Circuit breaker initialized"
        );
        metrics::record_breaker_state(&name, CircuitState::Closed);

        Self {
            name,
            failure_threshold: failure_threshold.max(1),
            open_duration,
            half_open_permits: half_open_permits.max(1),
            word: AtomicU64::new(pack(CircuitState::Closed, 0)),
            consecutive_failures: AtomicU32::new(0),
            opened_at: AtomicU64::new(0),
            epoch: Instant::now(),
        }
    }

    /// Create a breaker from configuration.
    pub fn from_config(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self::new(
            name,
            config.failure_threshold,
            config.open_duration(),
            config.half_open_permits,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        unpack(self.word.load(Ordering::Acquire)).0
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    pub fn half_open_in_flight(&self) -> u32 {
        let (state, in_flight) = unpack(self.word.load(Ordering::Acquire));
        if state == CircuitState::HalfOpen {
            in_flight
        } else {
            0
        }
    }

    /// Ask for permission to call the upstream.
    ///
    /// The returned [`Permit`] must be resolved with exactly one outcome.
    pub fn acquire_permission(&self) -> Result<Permit<'_>, BreakerRejected> {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            let (state, in_flight) = unpack(current);
            let next = match state {
                CircuitState::Closed => return Ok(Permit::new(self)),
                CircuitState::Open => {
                    if !self.open_duration_elapsed() {
                        return Err(BreakerRejected { state });
                    }
                    // Move to half-open and take the first probe slot in one step.
                    pack(CircuitState::HalfOpen, 1)
                }
                CircuitState::HalfOpen => {
                    if in_flight >= self.half_open_permits {
                        return Err(BreakerRejected { state });
                    }
                    pack(CircuitState::HalfOpen, in_flight + 1)
                }
            };

            match self
                .word
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    if state == CircuitState::Open {
                        self.log_transition(CircuitState::Open, CircuitState::HalfOpen);
                    }
                    return Ok(Permit::new(self));
                }
                Err(actual) => current = actual,
            }
        }
    }

    fn on_success(&self) {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            match unpack(current).0 {
                CircuitState::Closed => {
                    self.consecutive_failures.store(0, Ordering::Release);
                    return;
                }
                // Late report from a call admitted before the circuit opened.
                CircuitState::Open => return,
                CircuitState::HalfOpen => {
                    match self.word.compare_exchange_weak(
                        current,
                        pack(CircuitState::Closed, 0),
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => {
                            self.consecutive_failures.store(0, Ordering::Release);
                            self.log_transition(CircuitState::HalfOpen, CircuitState::Closed);
                            return;
                        }
                        Err(actual) => current = actual,
                    }
                }
            }
        }
    }

    fn on_failure(&self) {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            match unpack(current).0 {
                CircuitState::Closed => {
                    let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
                    if failures >= self.failure_threshold && self.try_open(current) {
                        self.log_transition(CircuitState::Closed, CircuitState::Open);
                    }
                    return;
                }
                CircuitState::Open => return,
                CircuitState::HalfOpen => {
                    if self.try_open(current) {
                        self.log_transition(CircuitState::HalfOpen, CircuitState::Open);
                        return;
                    }
                    current = self.word.load(Ordering::Acquire);
                }
            }
        }
    }

    /// CAS `from` to Open, re-arming the open timer. Returns false if the
    /// word changed underneath us.
    fn try_open(&self, from: u64) -> bool {
        // Published before the state so readers of Open never see a stale timer.
        self.opened_at.fetch_max(self.now_nanos(), Ordering::AcqRel);
        let opened = self
            .word
            .compare_exchange(from, pack(CircuitState::Open, 0), Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if opened {
            self.consecutive_failures.store(0, Ordering::Release);
        }
        opened
    }

    fn open_duration_elapsed(&self) -> bool {
        let opened_at = self.opened_at.load(Ordering::Acquire);
        let open_nanos = u64::try_from(self.open_duration.as_nanos()).unwrap_or(u64::MAX);
        self.now_nanos() >= opened_at.saturating_add(open_nanos)
    }

    fn now_nanos(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    fn log_transition(&self, from: CircuitState, to: CircuitState) {
        match to {
            CircuitState::Open => tracing::warn!(
                target_name = %self.name,
                %from,
                open_duration_ms = self.open_duration.as_millis() as u64,
                "Circuit breaker opened (failing fast)"
            ),
            CircuitState::HalfOpen => tracing::info!(
                target_name = %self.name,
                permits = self.half_open_permits,
                "Circuit breaker half-open (probing upstream)"
            ),
            CircuitState::Closed => tracing::info!(
                target_name = %self.name,
                "Circuit breaker closed (upstream recovered)"
            ),
        }
        metrics::record_breaker_state(&self.name, to);
    }
}

/// Permission to make one upstream call.
///
/// Resolve with [`Permit::report_success`] or [`Permit::report_failure`].
/// Dropping an unresolved permit records a failure.
#[derive(Debug)]
#[must_use = "a permit must be resolved with report_success or report_failure"]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    resolved: bool,
}

impl<'a> Permit<'a> {
    fn new(breaker: &'a CircuitBreaker) -> Self {
        Self {
            breaker,
            resolved: false,
        }
    }

    pub fn report_success(mut self) {
        self.resolved = true;
        self.breaker.on_success();
    }

    pub fn report_failure(mut self) {
        self.resolved = true;
        self.breaker.on_failure();
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            tracing::debug!(
                target_name = %self.breaker.name,
                "Permit dropped without outcome, recording failure"
            );
            self.breaker.on_failure();
        }
    }
}
