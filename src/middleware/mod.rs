//! HTTP middleware for address resolution, rate limiting, and observability.
//!
//! This module provides the request-processing pipeline stages:
//!
//! - **Request ID**: trace identifier tagging and propagation
//! - **Client IP**: resolves the true client address behind the load balancer
//! - **Rate Limiting**: fixed-window admission control keyed by client address
//! - **Path Cleaning**: collapses redundant separators before routing
//!
//! # Ordering
//!
//! ```text
//! Request ID → Client IP → Trace → Catch Panic → Clean Path → Timeout → Rate Limit
//! ```
//!
//! Address resolution must precede both logging and rate limiting: both key
//! on the resolved address, and running them first would key on the transport
//! peer (the load balancer) instead of the true client.

pub mod clean_path;
pub mod client_ip;
pub mod rate_limit;
pub mod request_id;

pub use clean_path::clean_path;
pub use client_ip::ClientIpLayer;
pub use rate_limit::{Decision, RateLimitLayer, RateLimiter};
pub use request_id::RequestIdLayer;
