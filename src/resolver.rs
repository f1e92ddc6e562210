//! Client address resolution.
//!
//! Produces exactly one canonical address string per request, from either a
//! trusted proxy header or the transport-level peer address. The resolved
//! value is written once into the request as a [`ClientAddr`] extension and
//! is read-only for the rest of that request's handling.
//!
//! # Trust Models
//!
//! Two mutually exclusive models exist, selected once at configuration time:
//!
//! - [`TrustModel::ForwardedChain`]: trusts `X-Forwarded-For` as written by a
//!   multi-hop proxy chain. The left-most comma-separated entry is the
//!   originating client, per proxy convention.
//! - [`TrustModel::EdgeHeader`]: trusts the single dedicated `X-Real-IP`
//!   header set exclusively by a specific edge proxy.
//!
//! The models must not be combined: whichever header the deployment's proxy
//! does NOT control is client-supplied and spoofable. Pick the model matching
//! the proxy actually in front of the service.
//!
//! # Fallback Policy
//!
//! An absent, empty, or unparseable trusted header falls through to the
//! transport peer address; resolution never fails a request and never yields
//! an empty value. This also guarantees the rate limiter always has a usable
//! key.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use axum::http::HeaderMap;

/// Fallback value when no transport peer address is available at all (e.g.
/// the service is driven without connect info). Requests sharing it are
/// collectively rate-limited rather than admitted unchecked.
pub const UNKNOWN_ADDR: &str = "unknown";

/// Which proxy header the resolver trusts for the client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrustModel {
    /// Multi-hop `X-Forwarded-For` chain; left-most entry wins.
    #[default]
    ForwardedChain,
    /// Single dedicated `X-Real-IP` header from a known edge proxy.
    EdgeHeader,
}

impl TrustModel {
    /// The header this model reads.
    pub fn header_name(&self) -> &'static str {
        match self {
            TrustModel::ForwardedChain => "x-forwarded-for",
            TrustModel::EdgeHeader => "x-real-ip",
        }
    }
}

impl FromStr for TrustModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x-forwarded-for" | "forwarded-chain" => Ok(TrustModel::ForwardedChain),
            "x-real-ip" | "edge-header" => Ok(TrustModel::EdgeHeader),
            other => Err(format!(
                "unknown trust model '{other}' (expected 'x-forwarded-for' or 'x-real-ip')"
            )),
        }
    }
}

impl fmt::Display for TrustModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header_name())
    }
}

/// The resolved client address for one request.
///
/// Created once by the resolution middleware and stored in the request
/// extensions; downstream stages (logging, rate limiting, handlers) read it
/// and must not overwrite it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(String);

impl ClientAddr {
    pub fn new(addr: String) -> Self {
        Self(addr)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ClientAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve the client address from request headers and the peer address.
///
/// First match wins:
///
/// 1. The trusted header, when present with a strictly parseable IP: returns
///    the canonical normalized form (`IpAddr` display).
/// 2. The transport peer address via [`resolve_peer`].
pub fn resolve(trust: TrustModel, headers: &HeaderMap, peer: &str) -> String {
    if let Some(addr) = from_trusted_header(trust, headers) {
        return addr;
    }
    resolve_peer(peer)
}

/// Extract and normalize the address from the trusted header, if possible.
///
/// Returns `None` for an absent, empty, or unparseable value; malformed
/// header values are ignored rather than rejected, falling through to the
/// peer address.
fn from_trusted_header(trust: TrustModel, headers: &HeaderMap) -> Option<String> {
    let value = headers.get(trust.header_name())?.to_str().ok()?;

    let candidate = match trust {
        // "client, proxy1, proxy2" - the left-most entry is the client
        TrustModel::ForwardedChain => value.split(',').next()?.trim(),
        TrustModel::EdgeHeader => value.trim(),
    };

    candidate.parse::<IpAddr>().ok().map(|ip| ip.to_string())
}

/// Normalize a transport-level peer address string.
///
/// Tries, in order: full `host:port` socket address, bare IP, a single
/// trailing `:port` (and surrounding brackets) stripped. If nothing parses
/// strictly, the raw host string is returned as a last resort - peer
/// resolution never fails.
pub fn resolve_peer(peer: &str) -> String {
    if let Ok(sock) = peer.parse::<SocketAddr>() {
        return sock.ip().to_string();
    }
    if let Ok(ip) = peer.parse::<IpAddr>() {
        return ip.to_string();
    }

    // No port present, or a host that is not an IP at all
    let host = peer.rsplit_once(':').map_or(peer, |(host, _)| host);
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    match host.parse::<IpAddr>() {
        Ok(ip) => ip.to_string(),
        Err(_) => host.to_string(),
    }
}
