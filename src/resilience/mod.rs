//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to upstream:
//!     → retries.rs (run attempts, classify failures, back off)
//!         → circuit_breaker.rs (permit per attempt, fail fast when open)
//!         → timeouts.rs (enforce the per-attempt deadline)
//!         → report outcome through the permit
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Breaker rejections are never retried
//! - Circuit breaker prevents cascading failures

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerRejected, CircuitBreaker, CircuitState, Permit};
pub use retries::RetryPolicy;
pub use timeouts::{with_deadline, DeadlineExceeded};
