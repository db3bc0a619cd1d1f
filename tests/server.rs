//! End-to-end test over a real TCP listener.

use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use vitals::config::ServiceConfig;
use vitals::health::Status;
use vitals::http::HttpServer;
use vitals::lifecycle::Shutdown;

mod common;

#[tokio::test]
async fn test_serves_app_and_health_routes_until_shutdown() {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.timeouts.request_ms = 50;

    let app = Router::new()
        .route("/hello", get(|| async { "hi" }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                "too late"
            }),
        );
    let probes = vec![common::probe("db", Status::Ok, "ok", 0)];

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, app, probes);
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();

    let res = client.get(format!("http://{addr}/hello")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "hi");

    let res = client.get(format!("http://{addr}/health/ready")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["checks"][0]["name"], "db");

    let res = client.get(format!("http://{addr}/slow")).send().await.unwrap();
    assert_eq!(res.status(), 503);
    assert_eq!(res.headers()["content-type"], "application/problem+json");
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["detail"], "request timeout exceeded");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), server_task)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}
