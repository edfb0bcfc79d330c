//! Error responses.
//!
//! Every failure leaves the service as the same JSON shape:
//! `{timestamp, status, error, message, path}`.
//!
//! # Status mapping
//! - `TflError::CircuitOpen` → 503
//! - `TflError::BadUpstreamRequest` → 400
//! - `TflError::UpstreamUnavailable` → 503

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::tfl::TflError;

/// JSON error body.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Unknown").to_owned(),
            message: message.into(),
            path: path.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, path)
    }

    /// Translate a terminal upstream failure.
    pub fn from_tfl_error(err: &TflError, path: impl Into<String>) -> Self {
        match err {
            TflError::CircuitOpen => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "TfL is temporarily unavailable (circuit open). Please retry shortly.",
                path,
            ),
            TflError::BadUpstreamRequest { status } => Self::new(
                StatusCode::BAD_REQUEST,
                format!("TfL rejected the request (HTTP {status})"),
                path,
            ),
            TflError::UpstreamUnavailable { .. } => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "TfL is currently unavailable. Please retry shortly.",
                path,
            ),
        }
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tfl::{TransportError, UpstreamError};
    use std::time::Duration;

    #[test]
    fn test_new_fills_reason_phrase() {
        let err = ApiError::new(StatusCode::TOO_MANY_REQUESTS, "slow down", "/api/lines/status");
        assert_eq!(err.status, 429);
        assert_eq!(err.error, "Too Many Requests");
        assert_eq!(err.path, "/api/lines/status");
    }

    #[test]
    fn test_tfl_error_mapping() {
        let open = ApiError::from_tfl_error(&TflError::CircuitOpen, "/x");
        assert_eq!(open.status, 503);

        let bad = ApiError::from_tfl_error(&TflError::BadUpstreamRequest { status: 404 }, "/x");
        assert_eq!(bad.status, 400);
        assert!(bad.message.contains("404"));

        let unavailable = TflError::UpstreamUnavailable {
            status: None,
            source: UpstreamError::Transport(TransportError::Timeout(Duration::from_millis(300))),
        };
        assert_eq!(ApiError::from_tfl_error(&unavailable, "/x").status, 503);
    }

    #[test]
    fn test_serialized_shape() {
        let err = ApiError::bad_request("Invalid date. Use yyyy-MM-dd", "/api/line/central/status");
        let value = serde_json::to_value(&err).unwrap();

        for key in ["timestamp", "status", "error", "message", "path"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["status"], 400);
    }

    #[test]
    fn test_into_response_status() {
        let response = ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "down", "/").into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
