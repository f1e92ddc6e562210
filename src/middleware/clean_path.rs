//! Path normalization middleware.
//!
//! Collapses runs of `/` in the request path before routing, so `GET //json`
//! reaches the `/json` handler. Applied as a router-wrapping layer; routing
//! sees the cleaned path.

use axum::extract::Request;
use axum::http::Uri;
use axum::middleware::Next;
use axum::response::Response;

/// Collapse redundant path separators before the request reaches the router.
pub async fn clean_path(mut req: Request, next: Next) -> Response {
    if req.uri().path().contains("//")
        && let Some(cleaned) = cleaned_uri(req.uri())
    {
        *req.uri_mut() = cleaned;
    }
    next.run(req).await
}

/// Rebuild the URI with a collapsed path, preserving the query string.
/// Returns `None` if the rebuilt URI fails to parse; the original is kept.
fn cleaned_uri(uri: &Uri) -> Option<Uri> {
    let path = collapse_slashes(uri.path());
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query.parse().ok()?);
    Uri::from_parts(parts).ok()
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !prev_slash {
                out.push(c);
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    out
}
