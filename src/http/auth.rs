//! HTTP Basic authentication for the health routes.
//!
//! # Responsibilities
//! - Reject requests whose `Authorization` header does not carry the configured credentials
//! - Answer rejections with a 401 problem response and a `WWW-Authenticate` realm challenge
//!
//! # Design Decisions
//! - The expected header value is encoded once, at layer construction
//! - Comparison touches every byte regardless of where a mismatch occurs

use axum::body::Body;
use axum::http::{header, HeaderValue, Request};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tower_http::validate_request::{ValidateRequest, ValidateRequestHeaderLayer};

use crate::config::BasicAuthConfig;
use crate::http::problem::ProblemDetail;

pub type BasicAuthLayer = ValidateRequestHeaderLayer<BasicAuth>;

/// Request validator accepting exactly one username/password pair.
#[derive(Clone)]
pub struct BasicAuth {
    expected: Vec<u8>,
    challenge: HeaderValue,
}

impl BasicAuth {
    pub fn new(username: &str, password: &str, realm: &str) -> Self {
        let encoded = STANDARD.encode(format!("{username}:{password}"));
        let challenge = HeaderValue::from_str(&format!("Basic realm=\"{realm}\""))
            .unwrap_or_else(|_| HeaderValue::from_static("Basic realm=\"Restricted\""));

        Self {
            expected: format!("Basic {encoded}").into_bytes(),
            challenge,
        }
    }

    fn reject(&self) -> Response {
        let mut response = ProblemDetail::unauthorized("authentication required").into_response();
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, self.challenge.clone());
        response
    }
}

// Never print the encoded credentials.
impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("challenge", &self.challenge)
            .finish_non_exhaustive()
    }
}

impl<B> ValidateRequest<B> for BasicAuth {
    type ResponseBody = Body;

    fn validate(&mut self, request: &mut Request<B>) -> Result<(), Response<Body>> {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .is_some_and(|provided| constant_time_eq(provided.as_bytes(), &self.expected));

        if authorized {
            Ok(())
        } else {
            tracing::debug!(path = %request.uri().path(), "Rejected request without valid credentials");
            Err(self.reject())
        }
    }
}

pub fn basic_auth_layer(config: &BasicAuthConfig) -> BasicAuthLayer {
    ValidateRequestHeaderLayer::custom(BasicAuth::new(&config.username, &config.password, &config.realm))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
