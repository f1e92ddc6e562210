//! Liveness/readiness endpoint.

use axum::http::header;
use axum::response::IntoResponse;

/// Health check endpoint.
///
/// Returns a fixed plaintext body; routed outside the rate-limited group so
/// probes keep working at capacity-exceeding request rates.
///
/// # Example
///
/// ```text
/// curl https://ipecho.dev/health
/// ok
/// ```
pub async fn health_check() -> impl IntoResponse {
    ([(header::CACHE_CONTROL, "no-store")], "ok\n")
}
