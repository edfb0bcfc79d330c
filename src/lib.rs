//! Tube status gateway library.
//!
//! Serves London Underground line status from the TfL Unified API behind a
//! per-client rate limiter, with every upstream call protected by retries,
//! a deadline and a circuit breaker.

// Core subsystems
pub mod config;
pub mod http;
pub mod service;
pub mod tfl;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use service::TubeStatusService;
pub use tfl::TflClient;
