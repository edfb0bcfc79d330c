//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, rate limit, metrics)
//! - Bind to a listener and serve until shutdown is signalled

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, http::Request, middleware, routing::get, Router};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::http::handlers::{
    all_lines_status, healthz, line_status, not_found, unplanned_disruptions, AppState,
};
use crate::http::middleware::track_metrics;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::lifecycle::ShutdownSignal;
use crate::security::{rate_limit_middleware, RateLimiter};
use crate::tfl::{TflClient, TransportError};

/// HTTP front end for the status API.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    /// Create a server talking to the configured TfL endpoint.
    pub fn new(config: AppConfig) -> Result<Self, TransportError> {
        let tfl = Arc::new(TflClient::from_config(&config)?);
        Ok(Self::with_client(config, tfl))
    }

    /// Create a server around an existing client.
    pub fn with_client(config: AppConfig, tfl: Arc<TflClient>) -> Self {
        let limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::from_config(&config.rate_limit)));

        if limiter.is_none() {
            tracing::warn!("Rate limiting disabled");
        }

        let router = Self::build_router(&config, AppState::new(tfl), limiter);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Rate limiting and metrics wrap every route and the fallback, so
    /// unknown paths are counted and throttled like any other request.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState, limiter: Option<Arc<RateLimiter>>) -> Router {
        let mut routes = Router::new()
            .route("/healthz", get(healthz))
            .route("/api/line/{line_id}/status", get(line_status))
            .route("/api/lines/status", get(all_lines_status))
            .route("/api/disruptions/unplanned", get(unplanned_disruptions))
            .fallback(not_found);

        if let Some(limiter) = limiter {
            routes = routes.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        }

        routes
            .layer(middleware::from_fn(track_metrics))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                        tracing::info_span!(
                            "request",
                            method = %req.method(),
                            uri = %req.uri(),
                            request_id = %request_id(req),
                        )
                    }))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.server.request_timeout_secs,
                    )))
                    .layer(propagate_request_id_layer()),
            )
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            rate_limit = self.config.rate_limit.enabled,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
