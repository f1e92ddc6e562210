//! Client address resolution middleware.
//!
//! Runs once per request, before logging and rate limiting, and stores the
//! resolved address as a typed [`ClientAddr`] extension. Downstream stages
//! read the extension; nothing overwrites it.
//!
//! The transport peer address comes from axum's `ConnectInfo`, which is only
//! populated when the app is served with
//! `into_make_service_with_connect_info::<SocketAddr>()`.

use std::net::SocketAddr;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use tower::{Layer, Service};
use tracing::debug;

use crate::resolver::{self, ClientAddr, TrustModel};

/// Address resolution layer for the Tower middleware stack.
#[derive(Debug, Clone, Copy)]
pub struct ClientIpLayer {
    trust: TrustModel,
}

impl ClientIpLayer {
    /// Create a resolution layer for the configured trust model.
    pub fn new(trust: TrustModel) -> Self {
        Self { trust }
    }
}

impl<S> Layer<S> for ClientIpLayer {
    type Service = ClientIpService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ClientIpService {
            inner,
            trust: self.trust,
        }
    }
}

/// Address resolution service wrapper.
#[derive(Clone)]
pub struct ClientIpService<S> {
    inner: S,
    trust: TrustModel,
}

impl<S> Service<Request<Body>> for ClientIpService<S>
where
    S: Service<Request<Body>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let resolved = match req.extensions().get::<ConnectInfo<SocketAddr>>() {
            Some(ConnectInfo(peer)) => {
                resolver::resolve(self.trust, req.headers(), &peer.to_string())
            }
            None => resolver::resolve(self.trust, req.headers(), resolver::UNKNOWN_ADDR),
        };

        debug!(client_addr = %resolved, "Resolved client address");
        req.extensions_mut().insert(ClientAddr::new(resolved));

        self.inner.call(req)
    }
}
