//! Status service subsystem.
//!
//! # Data Flow
//! ```text
//! Handler:
//!     → status.rs (TubeStatusService: call TfL, pick lines, filter)
//!         → tfl::TflClient (resilient upstream call)
//!         → mapper.rs (reshape a TfL Line into a LineStatusResponse)
//! ```
//!
//! # Design Decisions
//! - Upstream failures pass through untouched as `TflError`
//! - Planned-work detection is a keyword heuristic over the reasons

pub mod mapper;
pub mod status;

pub use mapper::{to_response, LineStatusResponse, UnplannedDisruptionsResponse};
pub use status::TubeStatusService;
