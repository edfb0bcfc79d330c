//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (assign / propagate request ID)
//!     → middleware (inbound metrics)
//!     → security::rate_limit (per-client admission)
//!     → handlers.rs (validate, call service / TfL)
//!     → service (reshape lines, filter unplanned disruptions)
//!     → response.rs (JSON error mapping)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::ApiError;
pub use server::HttpServer;
