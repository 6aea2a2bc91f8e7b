//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with scoring, status, health and admin routes
//! - Wire up middleware (tracing, timeout, body limit, request ID)
//! - Bind server to listener and drain on shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::config::ServiceConfig;
use crate::http::handlers::{health, score_batch, score_status};
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::scoring::BatchOrchestrator;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<BatchOrchestrator>,
    pub config: Arc<ServiceConfig>,
}

/// HTTP server for the scoring service.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a server around a long-lived orchestrator.
    pub fn new(config: ServiceConfig, orchestrator: Arc<BatchOrchestrator>) -> Self {
        let config = Arc::new(config);
        let state = AppState {
            orchestrator,
            config: Arc::clone(&config),
        };
        let router = Self::build_router(&config, state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/api/score/batch", post(score_batch))
            .route("/api/score/status", get(score_status))
            .route("/health", get(health))
            .with_state(state.clone());

        if config.admin.enabled {
            router = router.merge(setup_admin_router(state));
        } else {
            tracing::info!("Admin API disabled");
        }

        let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                request_id = %request_id(request),
                method = %request.method(),
                path = %request.uri().path(),
            )
        });

        router.layer(
            ServiceBuilder::new()
                .layer(set_request_id_layer())
                .layer(trace)
                .layer(propagate_request_id_layer())
                // Body limit wraps the timeout: Timeout needs a Default response body.
                .layer(RequestBodyLimitLayer::new(config.server.max_body_bytes))
                .layer(TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs))),
        )
    }

    /// Run the server until a shutdown signal is broadcast.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
