//! Liveness and readiness endpoints.
//!
//! - `GET /health/live` - always 200 `{"status":"ok"}`
//! - `GET /health/ready` - runs every registered probe; 200 when all pass, 503 otherwise
//!
//! Both routes sit behind HTTP Basic auth when credentials are configured.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::config::{BasicAuthConfig, ServiceConfig};
use crate::health::orchestrator::{overall_status, ReadinessOrchestrator};
use crate::health::probe::{CheckResult, Probe, Status};
use crate::http::auth::basic_auth_layer;
use crate::resilience::deadline::Deadline;

pub const LIVE_PATH: &str = "/health/live";
pub const READY_PATH: &str = "/health/ready";

#[derive(Debug, Serialize)]
pub struct LiveResponse {
    pub status: Status,
}

/// Body of the readiness endpoint. Checks are in registration order.
#[derive(Debug, Serialize)]
pub struct ReadinessReport {
    pub status: Status,
    pub checks: Vec<CheckResult>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub environment: String,
}

impl ReadinessReport {
    pub fn new(checks: Vec<CheckResult>, version: &str, environment: &str) -> Self {
        Self {
            status: overall_status(&checks),
            checks,
            version: version.to_string(),
            environment: environment.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        if self.status.is_ok() {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Shared state behind the health routes.
pub struct HealthState {
    probes: Vec<Arc<dyn Probe>>,
    orchestrator: ReadinessOrchestrator,
    version: String,
    environment: String,
    auth: Option<BasicAuthConfig>,
}

impl HealthState {
    pub fn new(probes: Vec<Arc<dyn Probe>>, orchestrator: ReadinessOrchestrator) -> Self {
        Self {
            probes,
            orchestrator,
            version: String::new(),
            environment: String::new(),
            auth: None,
        }
    }

    pub fn from_config(config: &ServiceConfig, probes: Vec<Arc<dyn Probe>>) -> Self {
        Self::new(probes, ReadinessOrchestrator::from_config(&config.readiness))
            .with_version(&config.service.version)
            .with_environment(&config.service.environment)
            .with_auth(config.health.auth.clone())
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Require these Basic credentials on the health routes.
    pub fn with_auth(mut self, auth: Option<BasicAuthConfig>) -> Self {
        self.auth = auth;
        self
    }

    /// Evaluate readiness under `parent`.
    pub async fn report(&self, parent: &Deadline) -> ReadinessReport {
        let checks = self.orchestrator.run_all(&self.probes, parent).await;
        ReadinessReport::new(checks, &self.version, &self.environment)
    }
}

/// Build the health router.
pub fn router(state: Arc<HealthState>) -> Router {
    let routes = Router::new()
        .route(LIVE_PATH, get(live))
        .route(READY_PATH, get(ready));

    let routes = match &state.auth {
        Some(auth) => routes.route_layer(basic_auth_layer(auth)),
        None => routes,
    };

    routes.with_state(state)
}

async fn live() -> Response {
    respond(StatusCode::OK, LiveResponse { status: Status::Ok })
}

async fn ready(State(state): State<Arc<HealthState>>, request: Request<Body>) -> Response {
    // Nest under the request deadline when a timeout guard installed one.
    let parent = request
        .extensions()
        .get::<Deadline>()
        .cloned()
        .unwrap_or_default();

    let report = state.report(&parent).await;
    tracing::debug!(status = report.status.as_str(), checks = report.checks.len(), "Readiness evaluated");

    respond(report.status_code(), report)
}

fn respond<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    disable_caching(response.headers_mut());
    response
}

fn disable_caching(headers: &mut HeaderMap) {
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store, no-cache"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("Thu, 01 Jan 1970 00:00:00 GMT"));
}
