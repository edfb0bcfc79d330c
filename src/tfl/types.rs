//! TfL payload types and the upstream failure taxonomy.

use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resilience::BreakerRejected;

/// A tube line as returned by the `/Line/.../Status` endpoints.
///
/// Decoded leniently: unknown fields are ignored, missing ones defaulted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Line {
    pub id: String,
    pub name: String,
    pub line_statuses: Vec<LineStatus>,
    pub disruptions: Vec<Disruption>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineStatus {
    pub status_severity: i32,
    pub status_severity_description: Option<String>,
    pub reason: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Disruption {
    pub category: Option<String>,
    pub description: Option<String>,
    pub additional_info: Option<String>,
    pub created: Option<String>,
    pub last_update: Option<String>,
}

/// Inclusive date range for planned-status queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Raw result of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The exchange itself failed: no status code was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    /// Outcome label used for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            TransportError::Timeout(_) => "timeout",
            TransportError::Connect(_) | TransportError::Request(_) => "error",
        }
    }
}

/// Failure of a single upstream attempt.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error(transparent)]
    Rejected(#[from] BreakerRejected),

    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to decode upstream payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl UpstreamError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Breaker rejections and client errors are final. Everything else
    /// (server errors, transport failures, undecodable bodies) is retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Rejected(_) => false,
            UpstreamError::Status(code) => *code >= 500,
            UpstreamError::Transport(_) | UpstreamError::Decode(_) => true,
        }
    }
}

/// Terminal outcome of a protected call, as seen by request handlers.
#[derive(Debug, Error)]
pub enum TflError {
    /// The breaker refused the call; no upstream attempt was made.
    #[error("TfL circuit breaker is open; failing fast")]
    CircuitOpen,

    /// The upstream rejected our request (4xx).
    #[error("TfL rejected the request with HTTP {status}")]
    BadUpstreamRequest { status: u16 },

    /// Server errors, transport failures and undecodable payloads after retries.
    #[error("TfL unavailable: {source}")]
    UpstreamUnavailable {
        status: Option<u16>,
        #[source]
        source: UpstreamError,
    },
}

impl From<UpstreamError> for TflError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Rejected(_) => TflError::CircuitOpen,
            UpstreamError::Status(status) if (400..500).contains(&status) => {
                TflError::BadUpstreamRequest { status }
            }
            UpstreamError::Status(status) => TflError::UpstreamUnavailable {
                status: Some(status),
                source: err,
            },
            other => TflError::UpstreamUnavailable {
                status: None,
                source: other,
            },
        }
    }
}

/// Result type for TfL operations.
pub type TflResult<T> = Result<T, TflError>;
