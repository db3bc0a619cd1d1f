//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use tower::ServiceExt;
use vitals::health::{Probe, Status};
use vitals::Deadline;

/// Send a GET to `path` through `router` in-process.
pub async fn get(router: Router, path: &str) -> Response {
    router
        .oneshot(Request::get(path).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// A probe with a fixed answer after a fixed delay. Ignores its deadline.
pub struct StaticProbe {
    pub name: &'static str,
    pub status: Status,
    pub message: &'static str,
    pub delay: Duration,
}

#[async_trait]
impl Probe for StaticProbe {
    fn name(&self) -> &str {
        self.name
    }

    async fn check(&self, _deadline: &Deadline) -> (Status, String) {
        tokio::time::sleep(self.delay).await;
        (self.status, self.message.to_string())
    }
}

pub fn probe(name: &'static str, status: Status, message: &'static str, delay_ms: u64) -> Arc<dyn Probe> {
    Arc::new(StaticProbe {
        name,
        status,
        message,
        delay: Duration::from_millis(delay_ms),
    })
}
