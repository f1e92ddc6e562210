//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (request order)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← tags X-Request-Id
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │    Client IP     │ ← writes ClientAddr (before logging & limiter)
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← method, path, resolved address, latency
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Catch Panic    │ ← 500 instead of a crashed process
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Clean Path     │ ← collapses redundant separators
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │     Timeout      │ ← wall-clock budget for the rest
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Rate Limit     │ ← 429; only / and /json, never /health
//! └────────┬─────────┘
//!          ▼
//!      Handler
//! ```
//!
//! Address resolution must precede tracing and rate limiting: both key on the
//! resolved address, and reordering them would key on the transport peer (the
//! load balancer) instead of the true client.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::routing::get;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{Span, info, info_span};

use crate::handlers;
use crate::metrics;
use crate::middleware::{ClientIpLayer, RateLimitLayer, RequestIdLayer, clean_path};
use crate::resolver::ClientAddr;
use crate::state::AppState;

/// Build the application router with all routes and middleware configured.
///
/// The rate limiter is injected from [`AppState`] rather than constructed
/// here, so multiple routers (e.g. in tests) never share window state by
/// accident.
pub fn build_router(state: &AppState) -> Router {
    let config = &state.config;

    // =========================================================================
    // Route groups: /health bypasses admission control entirely
    // =========================================================================
    let mut limited = Router::new()
        .route("/", get(handlers::plain_ip))
        .route("/json", get(handlers::json_ip));

    if config.rate_limiting_enabled() {
        info!(
            capacity = config.rate_limit_capacity,
            window_secs = config.rate_limit_window.as_secs(),
            "Rate limiting enabled"
        );
        limited = limited.layer(RateLimitLayer::new(state.limiter.clone()));
    } else {
        info!("Rate limiting disabled (RATE_LIMIT_CAPACITY=0)");
    }

    let router = Router::new()
        .route("/health", get(handlers::health_check))
        .merge(limited);

    // =========================================================================
    // Global middleware, in request order (ServiceBuilder applies top-down)
    // =========================================================================
    let trace = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            // Both fields below exist because the request-id and client-ip
            // layers already ran
            let client_addr = req
                .extensions()
                .get::<ClientAddr>()
                .map(ClientAddr::as_str)
                .unwrap_or("-");
            let request_id = req
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            info_span!(
                "request",
                method = %req.method(),
                path = %req.uri().path(),
                client_addr = %client_addr,
                request_id = %request_id,
            )
        })
        .on_response(|res: &Response<_>, latency: Duration, _span: &Span| {
            metrics::record_request(res.status().as_u16(), latency.as_secs_f64());
            info!(
                status = res.status().as_u16(),
                latency_ms = latency.as_millis() as u64,
                "Request completed"
            );
        });

    router.layer(
        ServiceBuilder::new()
            .layer(RequestIdLayer::new())
            .layer(ClientIpLayer::new(config.trust_model))
            .layer(trace)
            .layer(CatchPanicLayer::new())
            .layer(axum::middleware::from_fn(clean_path))
            .layer(TimeoutLayer::new(config.request_timeout)),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn test_state(capacity: u32) -> AppState {
        AppState::new(Config {
            rate_limit_capacity: capacity,
            metrics_port: 0,
            ..Config::default()
        })
    }

    #[tokio::test]
    async fn test_plain_endpoint_resolves_header() {
        let state = test_state(120);
        let app = build_router(&state);

        let req = Request::builder()
            .uri("/")
            .header("x-forwarded-for", "203.0.113.42, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"203.0.113.42\n");

        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_health_bypasses_rate_limit() {
        let state = test_state(1);
        let app = build_router(&state);

        // Exhaust the sole admission for this client
        for _ in 0..3 {
            let req = Request::builder()
                .uri("/")
                .header("x-forwarded-for", "203.0.113.42")
                .body(Body::empty())
                .unwrap();
            let _ = app.clone().oneshot(req).await.unwrap();
        }

        let req = Request::builder()
            .uri("/health")
            .header("x-forwarded-for", "203.0.113.42")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_with_reason_phrase() {
        let state = test_state(1);
        let app = build_router(&state);

        let admitted = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("x-forwarded-for", "203.0.113.42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(admitted.status(), StatusCode::OK);

        let rejected = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("x-forwarded-for", "203.0.113.42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(rejected.headers().contains_key("retry-after"));
        let body = axum::body::to_bytes(rejected.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Too Many Requests");

        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_double_slashes_are_collapsed() {
        let state = test_state(120);
        let app = build_router(&state);

        let req = Request::builder()
            .uri("//json")
            .header("x-forwarded-for", "203.0.113.42")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_response_carries_request_id() {
        let state = test_state(120);
        let app = build_router(&state);

        let req = Request::builder()
            .uri("/health")
            .header("x-request-id", "corr-42")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();

        assert_eq!(res.headers()["x-request-id"], "corr-42");
        state.shutdown().await;
    }
}
