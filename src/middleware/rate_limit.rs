//! Rate limiting middleware using fixed-window counters.
//!
//! # Algorithm
//!
//! Admission control counts requests per key within discrete, non-overlapping
//! windows. On each check: if the key's window has elapsed, the counter resets
//! and a new window starts; the counter is then incremented (attempts count
//! whether admitted or rejected) and the request is rejected once the
//! post-increment count exceeds capacity. A client hammering past its budget
//! therefore keeps consuming its window instead of sneaking through mid-way.
//!
//! # Keying
//!
//! The key is the resolved client address written by the resolution
//! middleware. If that extension is missing - the chain was misordered or the
//! resolver bypassed - the limiter falls back to a peer-address key so it
//! never silently admits unlimited traffic.
//!
//! # Concurrency
//!
//! Window state lives in a `DashMap`; the entry guard serializes updates for
//! one key (no lost updates under concurrent load) while distinct keys land
//! on independent shards and do not contend.
//!
//! # Response
//!
//! On reject: 429 with the plain status reason phrase as body, plus a
//! `Retry-After` hint with the seconds remaining in the window. Retrying is
//! the caller's responsibility.

use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use dashmap::DashMap;
use tower::{Layer, Service};
use tracing::warn;

use crate::metrics;
use crate::resolver::{self, ClientAddr};

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy)]
pub enum Decision {
    /// Below capacity; let the request through.
    Admit,
    /// Over capacity; reject with a backoff hint.
    Reject {
        /// Time remaining until the current window resets.
        retry_after: Duration,
    },
}

impl Decision {
    pub fn is_admit(&self) -> bool {
        matches!(self, Decision::Admit)
    }
}

/// Per-key window state: attempts seen and when the window started.
struct Window {
    count: u32,
    started: Instant,
}

/// Fixed-window per-key admission counter.
///
/// Cheap to clone; all clones share the same window state. Constructed once
/// from configuration and injected into the middleware chain at router build
/// time, so tests can run fully isolated instances.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<LimiterInner>,
}

struct LimiterInner {
    capacity: u32,
    window: Duration,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    /// Create a limiter admitting `capacity` requests per key per `window`.
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            inner: Arc::new(LimiterInner {
                capacity,
                window,
                windows: DashMap::new(),
            }),
        }
    }

    /// The configured per-window capacity.
    pub fn capacity(&self) -> u32 {
        self.inner.capacity
    }

    /// The configured window length.
    pub fn window(&self) -> Duration {
        self.inner.window
    }

    /// Check one admission attempt for `key`.
    ///
    /// The entry guard holds the key's shard lock for the duration of the
    /// update, so concurrent attempts on the same key are serialized and the
    /// counter cannot undercount.
    pub fn check(&self, key: &str) -> Decision {
        let mut entry = self
            .inner
            .windows
            .entry(key.to_string())
            .or_insert_with(|| Window {
                count: 0,
                started: Instant::now(),
            });

        let now = Instant::now();
        if now.duration_since(entry.started) >= self.inner.window {
            // Window elapsed - reset and start a new one
            entry.count = 0;
            entry.started = now;
        }

        entry.count = entry.count.saturating_add(1);
        if entry.count > self.inner.capacity {
            let retry_after = self
                .inner
                .window
                .saturating_sub(now.duration_since(entry.started));
            Decision::Reject { retry_after }
        } else {
            Decision::Admit
        }
    }

    /// Drop windows that have already elapsed.
    ///
    /// Purely housekeeping: an elapsed window would be reset on its next
    /// check anyway, so sweeping never changes admission decisions. Called
    /// periodically from a background task so idle keys do not accumulate.
    pub fn sweep(&self) {
        let window = self.inner.window;
        self.inner.windows.retain(|_, w| w.started.elapsed() < window);
    }

    /// Number of keys currently tracked (for logging and tests).
    pub fn tracked_keys(&self) -> usize {
        self.inner.windows.len()
    }
}

/// Rate limiting layer for the Tower middleware stack.
///
/// # Example
///
/// ```rust,ignore
/// let limiter = RateLimiter::new(120, Duration::from_secs(60));
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(RateLimitLayer::new(limiter));
/// ```
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: RateLimiter,
}

impl RateLimitLayer {
    /// Wrap an injected limiter as a layer.
    pub fn new(limiter: RateLimiter) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

/// Rate limiting service wrapper.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: RateLimiter,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let limiter = self.limiter.clone();
        let mut inner = self.inner.clone();

        let key = admission_key(&req);

        Box::pin(async move {
            match limiter.check(&key) {
                Decision::Admit => inner.call(req).await,
                Decision::Reject { retry_after } => {
                    let retry_secs = retry_after.as_secs().max(1);

                    warn!(
                        client_addr = %key,
                        path = %req.uri().path(),
                        retry_after_secs = retry_secs,
                        "Rate limit exceeded"
                    );
                    metrics::record_rate_limit_rejection();

                    let response = (
                        StatusCode::TOO_MANY_REQUESTS,
                        [
                            ("Retry-After", retry_secs.to_string()),
                            ("X-RateLimit-Limit", limiter.capacity().to_string()),
                            ("X-RateLimit-Remaining", "0".to_string()),
                        ],
                        StatusCode::TOO_MANY_REQUESTS
                            .canonical_reason()
                            .unwrap_or("Too Many Requests"),
                    )
                        .into_response();

                    Ok(response)
                }
            }
        })
    }
}

/// Derive the admission key for a request.
///
/// Primary: the `ClientAddr` extension. Fallback: the transport peer address,
/// then the shared unknown key.
fn admission_key(req: &Request<Body>) -> String {
    if let Some(addr) = req.extensions().get::<ClientAddr>() {
        return addr.as_str().to_string();
    }
    match req.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(peer)) => resolver::resolve_peer(&peer.to_string()),
        None => resolver::UNKNOWN_ADDR.to_string(),
    }
}
