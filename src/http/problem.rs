//! RFC 9457 problem details.
//!
//! # Responsibilities
//! - Model `application/problem+json` bodies
//! - Provide constructors for the common HTTP error statuses
//! - Render as an axum response
//!
//! # Design Decisions
//! - Extension members are flattened next to the standard members
//! - Extension keys that collide with standard members are rejected up front

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Map, Value};

/// Media type for problem detail bodies.
pub const PROBLEM_JSON: &str = "application/problem+json";

const RESERVED_KEYS: [&str; 5] = ["type", "title", "status", "detail", "instance"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProblemError {
    #[error("extension key conflicts with reserved RFC 9457 field: {0:?}")]
    ReservedExtensionKey(String),
}

/// A problem details object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProblemDetail {
    /// URI reference identifying the problem type.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_uri: Option<String>,

    /// Short, human-readable summary of the problem type.
    pub title: String,

    /// HTTP status code for this occurrence.
    pub status: u16,

    /// Explanation specific to this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// URI reference identifying this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,

    #[serde(flatten)]
    extensions: Map<String, Value>,
}

impl ProblemDetail {
    pub fn new(status: StatusCode, title: impl Into<String>) -> Self {
        Self {
            type_uri: None,
            title: title.into(),
            status: status.as_u16(),
            detail: None,
            instance: None,
            extensions: Map::new(),
        }
    }

    pub fn with_type(mut self, type_uri: impl Into<String>) -> Self {
        self.type_uri = Some(type_uri.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Add an extension member. Fails for the five standard member names.
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<Self, ProblemError> {
        let key = key.into();
        if RESERVED_KEYS.contains(&key.as_str()) {
            return Err(ProblemError::ReservedExtensionKey(key));
        }
        self.extensions.insert(key, value.into());
        Ok(self)
    }

    pub fn extensions(&self) -> &Map<String, Value> {
        &self.extensions
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn standard(status: StatusCode, detail: impl Into<String>) -> Self {
        let title = status.canonical_reason().unwrap_or("Unknown Error");
        Self::new(status, title).with_detail(detail)
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::standard(StatusCode::BAD_REQUEST, detail)
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::standard(StatusCode::UNAUTHORIZED, detail)
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::standard(StatusCode::FORBIDDEN, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::standard(StatusCode::NOT_FOUND, detail)
    }

    pub fn method_not_allowed(detail: impl Into<String>) -> Self {
        Self::standard(StatusCode::METHOD_NOT_ALLOWED, detail)
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::standard(StatusCode::CONFLICT, detail)
    }

    pub fn gone(detail: impl Into<String>) -> Self {
        Self::standard(StatusCode::GONE, detail)
    }

    pub fn unprocessable_entity(detail: impl Into<String>) -> Self {
        Self::standard(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }

    pub fn too_many_requests(detail: impl Into<String>) -> Self {
        Self::standard(StatusCode::TOO_MANY_REQUESTS, detail)
    }

    pub fn internal_server_error(detail: impl Into<String>) -> Self {
        Self::standard(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }

    pub fn service_unavailable(detail: impl Into<String>) -> Self {
        Self::standard(StatusCode::SERVICE_UNAVAILABLE, detail)
    }
}

impl IntoResponse for ProblemDetail {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match serde_json::to_vec(&self) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, status = self.status, "Failed to encode problem detail response");
                return status.into_response();
            }
        };

        let mut response = (status, body).into_response();
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON));
        response
    }
}
