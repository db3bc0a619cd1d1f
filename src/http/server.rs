//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Merge the application router with the health endpoints
//! - Wire up middleware (timeout guard, panic recovery, request ID, tracing)
//! - Serve on a listener with graceful shutdown
//!
//! # Layer order (outermost first)
//! ```text
//! set request id → trace span → propagate request id → recovery → trace context
//!     → timeout guard → handler
//! ```

use std::sync::Arc;

use axum::middleware::map_request;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::Level;

use crate::config::ServiceConfig;
use crate::health::{self, HealthState, Probe};
use crate::http::recovery::recovery_layer;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::shutdown;
use crate::observability::tracing::{insert_trace_context, RequestSpan};
use crate::resilience::timeouts::TimeoutLayer;

type AccessLogLayer = TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RequestSpan, DefaultOnRequest, DefaultOnResponse>;

/// Request spans plus one INFO event per completed response (status and latency).
fn access_log_layer() -> AccessLogLayer {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan)
        .on_response(DefaultOnResponse::new().level(Level::INFO).latency_unit(LatencyUnit::Millis))
}

/// HTTP server hosting an application router plus health endpoints.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
}

impl HttpServer {
    /// Create a server for `app`, registering `probes` for readiness.
    pub fn new(config: ServiceConfig, app: Router, probes: Vec<Arc<dyn Probe>>) -> Self {
        let health_state = Arc::new(HealthState::from_config(&config, probes));
        let router = Self::build_router(&config, app, health_state);
        Self { router, config }
    }

    /// Build the router with all middleware layers.
    fn build_router(config: &ServiceConfig, app: Router, health_state: Arc<HealthState>) -> Router {
        app.merge(health::router(health_state))
            .layer(TimeoutLayer::from_millis(config.timeouts.request_ms))
            .layer(map_request(insert_trace_context))
            .layer(recovery_layer())
            .layer(propagate_request_id_layer())
            .layer(access_log_layer())
            .layer(set_request_id_layer())
    }

    /// The fully layered router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            request_timeout_ms = self.config.timeouts.request_ms,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait_for(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
