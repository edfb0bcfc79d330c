//! TfL upstream subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP handler:
//!     → client.rs (resilient call: retry, breaker, deadline)
//!         → transport.rs (one HTTP GET)
//!     → types.rs (decoded lines or a terminal TflError)
//! ```
//!
//! # Design Decisions
//! - Payloads are passed through as decoded, never reinterpreted
//! - One breaker guards every TfL endpoint

pub mod client;
pub mod transport;
pub mod types;

pub use client::TflClient;
pub use transport::{ReqwestTransport, Transport};
pub use types::{
    DateRange, Disruption, Line, LineStatus, TflError, TflResult, TransportError, UpstreamError,
    UpstreamResponse,
};
