//! Per-client fixed-window rate limiting.
//!
//! Each key (client IP) owns one window packed into a single `AtomicU64`:
//! the high 40 bits hold the window start (ms since the limiter was created),
//! the low 24 bits hold the request count. Rotating an elapsed window and
//! counting a request are the same compare-and-set, so a window is replaced
//! exactly once no matter how many callers race on it.
//!
//! Windows are fixed, not sliding: a burst straddling a boundary can admit
//! close to twice the limit. Keys are never evicted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::security::headers::client_ip;

const COUNT_BITS: u32 = 24;
const COUNT_MASK: u64 = (1 << COUNT_BITS) - 1;

/// Largest configurable per-window limit. The saturated counter value sits
/// one above it so a full window always rejects.
pub const MAX_REQUESTS_PER_WINDOW: u32 = (COUNT_MASK - 1) as u32;

pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

fn pack(start_ms: u64, count: u64) -> u64 {
    (start_ms << COUNT_BITS) | count
}

fn unpack(word: u64) -> (u64, u64) {
    (word >> COUNT_BITS, word & COUNT_MASK)
}

/// One key's counting window.
#[derive(Debug)]
struct FixedWindow {
    state: AtomicU64,
}

impl FixedWindow {
    fn new(start_ms: u64) -> Self {
        Self {
            state: AtomicU64::new(pack(start_ms, 0)),
        }
    }
}

/// Fixed-window admission counter keyed by client.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, FixedWindow>,
    max_requests: u32,
    window: Duration,
    window_ms: u64,
    epoch: Instant,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests: max_requests.min(MAX_REQUESTS_PER_WINDOW),
            window,
            window_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
            epoch: Instant::now(),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window())
    }

    /// Count a request for `key` and decide whether to admit it.
    pub fn allow(&self, key: &str) -> bool {
        let now = self.now_ms();
        if let Some(window) = self.windows.get(key) {
            return self.admit(&window, now);
        }
        let window = self
            .windows
            .entry(key.to_owned())
            .or_insert_with(|| FixedWindow::new(now));
        self.admit(&window, now)
    }

    fn admit(&self, window: &FixedWindow, now: u64) -> bool {
        let mut current = window.state.load(Ordering::Acquire);
        loop {
            let (start, count) = unpack(current);
            let next = if now > start.saturating_add(self.window_ms) {
                pack(now, 1)
            } else {
                pack(start, (count + 1).min(COUNT_MASK))
            };

            match window
                .state
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return unpack(next).1 <= u64::from(self.max_requests),
                Err(actual) => current = actual,
            }
        }
    }

    /// Requests counted in `key`'s current window, if the key has been seen.
    pub fn count(&self, key: &str) -> Option<u32> {
        self.windows
            .get(key)
            .map(|w| unpack(w.state.load(Ordering::Acquire)).1 as u32)
    }

    /// Number of distinct keys tracked so far.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// `Retry-After` hint: the window length in whole seconds, at least 1.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.window.as_secs() + u64::from(self.window.subsec_nanos() > 0);
        secs.max(1)
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Middleware enforcing the per-client limit before any handler work.
///
/// Installed router-wide, so unmatched paths and the fallback count too.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = client_ip(&request);

    if limiter.allow(&client) {
        return next.run(request).await;
    }

    let path = request.uri().path().to_owned();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    tracing::warn!(client = %client, route = %route, "Rate limit exceeded");
    metrics::record_rate_limited(&route);

    let mut response =
        ApiError::new(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded", path).into_response();
    let headers = response.headers_mut();
    headers.insert(header::RETRY_AFTER, HeaderValue::from(limiter.retry_after_secs()));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from_static("0"));
    response
}
