//! Request timeout guard behaviour under adversarial handler timing.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::Extension;
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use vitals::http::recovery::recovery_layer;
use vitals::http::PROBLEM_JSON;
use vitals::resilience::DeadlineError;
use vitals::{Deadline, ResponseWriter, TimeoutLayer};

mod common;

const UNSET: u8 = 0;
const ACCEPTED: u8 = 1;
const DISCARDED: u8 = 2;

fn guarded(router: Router, timeout_ms: i64) -> Router {
    router.layer(TimeoutLayer::from_millis(timeout_ms))
}

fn delayed(delay: Duration) -> Router {
    Router::new().route(
        "/",
        get(move || async move {
            tokio::time::sleep(delay).await;
            (StatusCode::OK, [("x-handler", "yes")], "success")
        }),
    )
}

async fn wait_until_set(flag: &AtomicU8) -> u8 {
    for _ in 0..100 {
        let value = flag.load(Ordering::SeqCst);
        if value != UNSET {
            return value;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    UNSET
}

#[tokio::test]
async fn test_fast_handler_response_passes_through() {
    let app = guarded(delayed(Duration::from_millis(10)), 100);

    let response = common::get(app, "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-handler"], "yes");
    assert_eq!(common::body_bytes(response).await, b"success");
}

#[tokio::test]
async fn test_slow_handler_gets_synthetic_503() {
    let app = guarded(delayed(Duration::from_millis(100)), 10);

    let response = common::get(app, "/").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()[header::CONTENT_TYPE], PROBLEM_JSON);
    assert!(response.headers().get("x-handler").is_none());
    assert_eq!(
        common::body_json(response).await,
        json!({
            "status": 503,
            "title": "Service Unavailable",
            "detail": "request timeout exceeded",
        })
    );
}

#[tokio::test]
async fn test_late_handler_write_is_discarded() {
    let late_write = Arc::new(AtomicU8::new(UNSET));
    let flag = late_write.clone();

    let app = guarded(
        Router::new().route(
            "/",
            get(move |Extension(writer): Extension<ResponseWriter>| {
                let flag = flag.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    let accepted = writer.write((StatusCode::OK, "late bytes").into_response());
                    flag.store(if accepted { ACCEPTED } else { DISCARDED }, Ordering::SeqCst);
                    (StatusCode::OK, "late return")
                }
            }),
        ),
        10,
    );

    let response = common::get(app, "/").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = common::body_json(response).await;
    assert_eq!(body["detail"], "request timeout exceeded");

    // The handler keeps running after the timeout and its write loses the gate.
    assert_eq!(wait_until_set(&late_write).await, DISCARDED);
}

#[tokio::test]
async fn test_early_commit_wins_over_deadline() {
    let app = guarded(
        Router::new().route(
            "/",
            get(|Extension(writer): Extension<ResponseWriter>| async move {
                writer.write((StatusCode::ACCEPTED, "committed early").into_response());
                tokio::time::sleep(Duration::from_millis(80)).await;
                (StatusCode::OK, "ignored")
            }),
        ),
        10,
    );

    let response = common::get(app, "/").await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(common::body_bytes(response).await, b"committed early");
}

#[tokio::test]
async fn test_disabled_guard_installs_nothing() {
    for timeout_ms in [0, -1_000] {
        let app = guarded(
            Router::new().route(
                "/",
                get(|request: Request<Body>| async move {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    let installed = request.extensions().get::<Deadline>().is_some()
                        || request.extensions().get::<ResponseWriter>().is_some();
                    (StatusCode::IM_A_TEAPOT, if installed { "guarded" } else { "bare" })
                }),
            ),
            timeout_ms,
        );

        let response = common::get(app, "/").await;

        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(common::body_bytes(response).await, b"bare");
    }
}

#[tokio::test]
async fn test_huge_timeout_passes_handler_response_through() {
    let app = Router::new()
        .route("/", get(|| async { "fine" }))
        .layer(TimeoutLayer::new(Duration::MAX))
        .layer(recovery_layer());

    let response = common::get(app, "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::body_bytes(response).await, b"fine");
}

#[tokio::test]
async fn test_handler_observes_expired_deadline() {
    let observed = Arc::new(AtomicU8::new(UNSET));
    let flag = observed.clone();

    let app = guarded(
        Router::new().route(
            "/",
            get(move |Extension(deadline): Extension<Deadline>| {
                let flag = flag.clone();
                async move {
                    let reason = deadline.done().await;
                    flag.store(
                        if reason == DeadlineError::Exceeded { ACCEPTED } else { DISCARDED },
                        Ordering::SeqCst,
                    );
                    StatusCode::OK
                }
            }),
        ),
        10,
    );

    let response = common::get(app, "/").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(wait_until_set(&observed).await, ACCEPTED);
}

async fn exploding() -> Response {
    panic!("handler exploded");
}

#[tokio::test]
async fn test_panic_reaches_outer_recovery_layer() {
    let app = guarded(Router::new().route("/", get(exploding)), 1_000).layer(recovery_layer());

    let response = common::get(app, "/").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()[header::CONTENT_TYPE], PROBLEM_JSON);
    let body = common::body_json(response).await;
    assert_eq!(body["title"], "Internal Server Error");
}

#[tokio::test]
#[should_panic(expected = "handler exploded")]
async fn test_panic_resumed_on_calling_task() {
    let app = guarded(Router::new().route("/", get(exploding)), 1_000);
    common::get(app, "/").await;
}

#[tokio::test]
async fn test_concurrent_requests_each_get_one_response() {
    let app = guarded(
        Router::new().route(
            "/{delay}",
            get(|axum::extract::Path(delay): axum::extract::Path<u64>| async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                format!("done {delay}")
            }),
        ),
        40,
    );

    let requests = [0_u64, 5, 80, 120, 10, 90].map(|delay| {
        let app = app.clone();
        tokio::spawn(async move { (delay, common::get(app, &format!("/{delay}")).await) })
    });

    for request in requests {
        let (delay, response) = request.await.unwrap();
        if delay <= 10 {
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(common::body_bytes(response).await, format!("done {delay}").as_bytes());
        } else {
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        }
    }
}
