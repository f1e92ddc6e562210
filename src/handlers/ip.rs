//! Client IP echo endpoints.
//!
//! Both handlers read the [`ClientAddr`] extension written by the resolution
//! middleware; they never re-derive the address themselves. Responses carry
//! `Cache-Control: no-store` - the answer is specific to the caller and the
//! moment.

use axum::Extension;
use axum::Json;
use axum::http::header;
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::instrument;

use crate::resolver::ClientAddr;

/// JSON body for `GET /json`.
#[derive(Debug, Serialize)]
pub struct IpResponse {
    pub ip: String,
}

/// Plaintext echo of the resolved client address.
///
/// The primary endpoint for cURL users:
///
/// ```text
/// curl -4 https://ipecho.dev
/// 203.0.113.42
/// ```
#[instrument(skip_all)]
pub async fn plain_ip(Extension(client): Extension<ClientAddr>) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "no-store")],
        format!("{client}\n"),
    )
}

/// JSON echo of the resolved client address.
///
/// ```text
/// curl -4 https://ipecho.dev/json
/// {"ip":"203.0.113.42"}
/// ```
#[instrument(skip_all)]
pub async fn json_ip(Extension(client): Extension<ClientAddr>) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "no-store")],
        Json(IpResponse {
            ip: client.into_inner(),
        }),
    )
}
