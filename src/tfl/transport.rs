//! Outbound HTTP transport.
//!
//! The orchestrator only needs "GET this URL within this deadline", so the
//! seam is a small trait. Production uses a pooled `reqwest` client; tests
//! substitute a scripted transport.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::resilience::with_deadline;
use crate::tfl::types::{TransportError, UpstreamResponse};

/// Performs a single HTTP GET exchange.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Fetch `url`, giving up once `deadline` has elapsed. Any status code
    /// counts as a completed exchange.
    async fn get(&self, url: &str, deadline: Duration) -> Result<UpstreamResponse, TransportError>;
}

/// `reqwest`-backed transport with a shared connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, deadline: Duration) -> Result<UpstreamResponse, TransportError> {
        let exchange = async {
            let response = self
                .client
                .get(url)
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await
                .map_err(|e| classify(e, deadline))?;
            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| classify(e, deadline))?;
            Ok::<_, TransportError>(UpstreamResponse { status, body })
        };

        with_deadline(deadline, exchange)
            .await
            .map_err(|e| TransportError::Timeout(e.0))?
    }
}

fn classify(err: reqwest::Error, deadline: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(deadline)
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}
