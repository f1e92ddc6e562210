//! Integration tests driving the full stack over a real listener.
//!
//! Each test spins up its own server on an ephemeral port with its own
//! isolated rate limiter, then exercises the endpoints with reqwest.
//!
//! Run with: `cargo test --test integration_tests`
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::time::Duration;

use reqwest::{Client, StatusCode};

use ipecho::{AppState, Config, TrustModel, build_router};

/// Test fixture: a running server plus a client pointed at it.
struct TestServer {
    base_url: String,
    client: Client,
    state: AppState,
}

impl TestServer {
    /// Start a server for the given configuration on an ephemeral port.
    async fn start(config: Config) -> Self {
        let state = AppState::new(config);
        let app = build_router(&state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind ephemeral port");
        let addr = listener.local_addr().expect("Failed to read local address");

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Server failed");
        });

        Self {
            base_url: format!("http://{addr}"),
            client: Client::new(),
            state,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn stop(self) {
        self.state.shutdown().await;
    }
}

/// Config used by most tests: metrics off, generous limits.
fn test_config() -> Config {
    Config {
        metrics_port: 0,
        ..Config::default()
    }
}

#[tokio::test]
async fn plain_endpoint_returns_forwarded_client_address() {
    let server = TestServer::start(test_config()).await;

    let res = server
        .client
        .get(server.url("/"))
        .header("x-forwarded-for", "203.0.113.42, 10.0.0.1")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()["content-type"],
        "text/plain; charset=utf-8"
    );
    assert_eq!(res.headers()["cache-control"], "no-store");
    assert_eq!(res.text().await.unwrap(), "203.0.113.42\n");

    server.stop().await;
}

#[tokio::test]
async fn json_endpoint_returns_forwarded_client_address() {
    let server = TestServer::start(test_config()).await;

    let res = server
        .client
        .get(server.url("/json"))
        .header("x-forwarded-for", "203.0.113.42, 10.0.0.1")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "application/json");
    assert_eq!(res.headers()["cache-control"], "no-store");

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body, serde_json::json!({"ip": "203.0.113.42"}));

    server.stop().await;
}

#[tokio::test]
async fn missing_header_falls_back_to_peer_address() {
    let server = TestServer::start(test_config()).await;

    let res = server.client.get(server.url("/")).send().await.unwrap();

    // The test client connects over loopback
    assert_eq!(res.text().await.unwrap(), "127.0.0.1\n");

    server.stop().await;
}

#[tokio::test]
async fn malformed_header_falls_back_to_peer_address() {
    let server = TestServer::start(test_config()).await;

    let res = server
        .client
        .get(server.url("/"))
        .header("x-forwarded-for", "not-an-address")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "127.0.0.1\n");

    server.stop().await;
}

#[tokio::test]
async fn edge_header_model_reads_real_ip() {
    let server = TestServer::start(Config {
        trust_model: TrustModel::EdgeHeader,
        ..test_config()
    })
    .await;

    let res = server
        .client
        .get(server.url("/"))
        .header("x-real-ip", "192.0.2.9")
        // Must be ignored under this model
        .header("x-forwarded-for", "203.0.113.42")
        .send()
        .await
        .unwrap();

    assert_eq!(res.text().await.unwrap(), "192.0.2.9\n");

    server.stop().await;
}

#[tokio::test]
async fn health_endpoint_returns_fixed_body() {
    let server = TestServer::start(test_config()).await;

    let res = server.client.get(server.url("/health")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "ok\n");

    server.stop().await;
}

#[tokio::test]
async fn requests_past_capacity_are_rejected() {
    let server = TestServer::start(Config {
        rate_limit_capacity: 2,
        rate_limit_window: Duration::from_secs(60),
        ..test_config()
    })
    .await;

    for _ in 0..2 {
        let res = server.client.get(server.url("/")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = server.client.get(server.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers().contains_key("retry-after"));
    assert_eq!(res.text().await.unwrap(), "Too Many Requests");

    server.stop().await;
}

#[tokio::test]
async fn health_stays_reachable_past_capacity() {
    let server = TestServer::start(Config {
        rate_limit_capacity: 1,
        ..test_config()
    })
    .await;

    // Burn well past the per-client budget
    for _ in 0..5 {
        let _ = server.client.get(server.url("/")).send().await.unwrap();
    }

    let res = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    server.stop().await;
}

#[tokio::test]
async fn rate_limit_keys_on_resolved_address() {
    let server = TestServer::start(Config {
        rate_limit_capacity: 1,
        ..test_config()
    })
    .await;

    // Exhaust one client's budget
    let res = server
        .client
        .get(server.url("/"))
        .header("x-forwarded-for", "203.0.113.1")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = server
        .client
        .get(server.url("/"))
        .header("x-forwarded-for", "203.0.113.1")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    // A different resolved client still gets through
    let res = server
        .client
        .get(server.url("/"))
        .header("x-forwarded-for", "203.0.113.2")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    server.stop().await;
}

#[tokio::test]
async fn request_id_is_echoed_or_generated() {
    let server = TestServer::start(test_config()).await;

    let res = server
        .client
        .get(server.url("/health"))
        .header("x-request-id", "my-correlation-id")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "my-correlation-id");

    let res = server.client.get(server.url("/health")).send().await.unwrap();
    assert!(!res.headers()["x-request-id"].is_empty());

    server.stop().await;
}

#[tokio::test]
async fn redundant_separators_are_collapsed() {
    let server = TestServer::start(test_config()).await;

    let res = server
        .client
        .get(server.url("//json"))
        .header("x-forwarded-for", "203.0.113.42")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["ip"], "203.0.113.42");

    server.stop().await;
}
