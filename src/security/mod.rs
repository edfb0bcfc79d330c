//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (identify the client)
//!     → rate_limit.rs (check per-client window)
//!     → Pass to handler
//! ```
//!
//! # Design Decisions
//! - Rate limiting runs before any handler or upstream work
//! - Fail closed: a rejected request never reaches the upstream

pub mod headers;
pub mod rate_limit;

pub use rate_limit::{rate_limit_middleware, RateLimiter};
