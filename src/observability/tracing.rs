//! Request span construction and W3C trace context extraction.
//!
//! # Responsibilities
//! - Parse the `traceparent` header into explicit trace fields
//! - Create one span per request carrying request id and trace fields
//! - Expose the parsed context to handlers as an `Extension<TraceContext>`
//!
//! # Design Decisions
//! - Correlation values travel as span fields and request extensions,
//!   never as process-wide state
//! - Malformed `traceparent` headers are ignored, not rejected

use axum::body::Body;
use axum::http::{HeaderMap, Request};
use tower_http::trace::MakeSpan;
use tracing::Span;

use crate::http::request::X_REQUEST_ID;

pub const TRACEPARENT: &str = "traceparent";

/// Trace identifiers carried by an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
    pub trace_flags: String,
}

impl TraceContext {
    /// Parse a `version-traceid-spanid-flags` header value.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.trim().split('-');
        let version = parts.next()?;
        let trace_id = parts.next()?;
        let span_id = parts.next()?;
        let trace_flags = parts.next()?;

        let well_formed = is_lower_hex(version, 2)
            && version != "ff"
            && is_lower_hex(trace_id, 32)
            && is_lower_hex(span_id, 16)
            && is_lower_hex(trace_flags, 2)
            && !trace_id.bytes().all(|b| b == b'0')
            && !span_id.bytes().all(|b| b == b'0');

        // Version 00 has exactly four fields.
        if !well_formed || (version == "00" && parts.next().is_some()) {
            return None;
        }

        Some(Self {
            trace_id: trace_id.to_string(),
            span_id: span_id.to_string(),
            trace_flags: trace_flags.to_string(),
        })
    }

    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(TRACEPARENT)
            .and_then(|v| v.to_str().ok())
            .and_then(Self::parse)
    }
}

/// `map_request` middleware storing the inbound [`TraceContext`] in request extensions.
///
/// Requests without a well-formed `traceparent` pass through untouched.
pub async fn insert_trace_context(mut request: Request<Body>) -> Request<Body> {
    if let Some(ctx) = TraceContext::from_headers(request.headers()) {
        request.extensions_mut().insert(ctx);
    }
    request
}

fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// [`MakeSpan`] that records request id and trace context on each request span.
#[derive(Debug, Clone, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");

        let span = tracing::info_span!(
            "http_request",
            method = %request.method(),
            path = %request.uri().path(),
            request_id = %request_id,
            trace_id = tracing::field::Empty,
            span_id = tracing::field::Empty,
            trace_flags = tracing::field::Empty,
        );

        if let Some(ctx) = TraceContext::from_headers(request.headers()) {
            span.record("trace_id", ctx.trace_id.as_str());
            span.record("span_id", ctx.span_id.as_str());
            span.record("trace_flags", ctx.trace_flags.as_str());
        }

        span
    }
}
