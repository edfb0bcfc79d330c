//! TfL Unified API client with retry, deadline and circuit-breaker protection.
//!
//! # Call flow
//! ```text
//! get_line_status / get_all_tube_line_status
//!     → RetryPolicy::execute
//!         → CircuitBreaker::acquire_permission   (rejected → CircuitOpen, no retry)
//!         → Transport::get within the deadline
//!         → Permit::report_success / report_failure
//!     → translate the final UpstreamError into a TflError
//! ```
//!
//! A permit dropped mid-flight (caller went away) counts as a failure.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;

use crate::config::AppConfig;
use crate::observability::metrics;
use crate::resilience::{CircuitBreaker, RetryPolicy};
use crate::tfl::transport::{ReqwestTransport, Transport};
use crate::tfl::types::{DateRange, Line, TflError, TflResult, TransportError, UpstreamError};

/// Breaker and metrics label for the TfL upstream.
pub const TARGET: &str = "tfl";

/// Resilient client for the line-status endpoints.
#[derive(Clone)]
pub struct TflClient {
    transport: Arc<dyn Transport>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    base_url: String,
    deadline: Duration,
}

impl TflClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryPolicy,
        base_url: impl Into<String>,
        deadline: Duration,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self {
            transport,
            breaker,
            retry,
            base_url,
            deadline,
        }
    }

    /// Build the production client from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(config.upstream.connect_timeout())?;
        let breaker = CircuitBreaker::from_config(TARGET, &config.circuit_breaker);

        tracing::info!(
            base_url = %config.upstream.base_url,
            timeout_ms = config.upstream.timeout_ms,
            max_attempts = config.retry.max_attempts,
            "TfL client initialized"
        );

        Ok(Self::new(
            Arc::new(transport),
            Arc::new(breaker),
            RetryPolicy::from_config(&config.retry),
            config.upstream.base_url.clone(),
            config.upstream.timeout(),
        ))
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Upstream root, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Status of one line, optionally for a planned date range.
    pub async fn get_line_status(
        &self,
        line_id: &str,
        range: Option<DateRange>,
    ) -> TflResult<Vec<Line>> {
        let id: String = url::form_urlencoded::byte_serialize(line_id.as_bytes()).collect();
        let path = match range {
            Some(DateRange { from, to }) => {
                format!("/Line/{id}/Status/{}/to/{}", from.format("%Y-%m-%d"), to.format("%Y-%m-%d"))
            }
            None => format!("/Line/{id}/Status"),
        };
        self.get_json(&path).await
    }

    /// Current status of every tube line.
    pub async fn get_all_tube_line_status(&self) -> TflResult<Vec<Line>> {
        self.get_json("/Line/Mode/tube/Status").await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> TflResult<T> {
        let url = format!("{}{}", self.base_url, path);

        self.retry
            .execute(|| self.attempt(&url), UpstreamError::is_retryable)
            .await
            .map_err(|err| {
                match &err {
                    UpstreamError::Rejected(rejected) => {
                        metrics::record_breaker_rejected(TARGET);
                        tracing::warn!(url = %url, state = %rejected.state, "TfL call rejected by circuit breaker");
                    }
                    other => tracing::error!(url = %url, error = %other, "TfL call failed"),
                }
                TflError::from(err)
            })
    }

    /// One protected attempt: permit, exchange, report.
    async fn attempt<T: DeserializeOwned>(&self, url: &str) -> Result<T, UpstreamError> {
        let permit = self.breaker.acquire_permission()?;
        let start = Instant::now();
        tracing::debug!(url = %url, "TfL GET");

        match self.transport.get(url, self.deadline).await {
            Ok(response) => {
                metrics::record_upstream_request(TARGET, &response.status.to_string(), start);
                if response.is_success() {
                    permit.report_success();
                    Ok(serde_json::from_str(&response.body)?)
                } else {
                    permit.report_failure();
                    tracing::warn!(url = %url, status = response.status, "TfL returned an error status");
                    Err(UpstreamError::Status(response.status))
                }
            }
            Err(err) => {
                metrics::record_upstream_request(TARGET, err.outcome(), start);
                permit.report_failure();
                tracing::warn!(url = %url, error = %err, "TfL transport failure");
                Err(err.into())
            }
        }
    }
}

impl fmt::Debug for TflClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TflClient")
            .field("base_url", &self.base_url)
            .field("deadline", &self.deadline)
            .field("retry", &self.retry)
            .field("breaker_state", &self.breaker.state())
            .finish()
    }
}
