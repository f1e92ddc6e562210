//! # ipecho
//!
//! An HTTP service that reports the caller's public IP address, built to run
//! behind a cloud load balancer that terminates TLS and injects proxy
//! headers. Features:
//!
//! - **Address resolution**: canonical client address from a configured
//!   trusted proxy header, with a transport-peer fallback
//! - **Admission control**: per-client fixed-window rate limiting
//! - **Resilience**: panic recovery, per-request deadlines, signal-driven
//!   graceful shutdown with a bounded grace period
//! - **Observability**: request IDs, structured logging, Prometheus metrics
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Request ID → Client IP → Trace → Catch Panic   │
//! │              → Clean Path → Timeout → Rate Limit)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (/, /json, /health)                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ipecho::{AppState, Config, build_router};
//!
//! # async fn run() -> ipecho::AppResult<()> {
//! let config = Config::from_env()?;
//! let state = AppState::new(config);
//! let app = build_router(&state);
//! // Serve with into_make_service_with_connect_info::<SocketAddr>() ...
//! # Ok(())
//! # }
//! ```
//!
//! ## Trust Model Configuration
//!
//! Pick the header matching the proxy actually in front of the service:
//! ```bash
//! TRUST_MODEL=x-forwarded-for cargo run   # multi-hop chain (default)
//! TRUST_MODEL=x-real-ip cargo run         # dedicated edge-proxy header
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod resolver;
pub mod routes;
pub mod state;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use error::{AppError, AppResult};
pub use resolver::{ClientAddr, TrustModel};
pub use routes::build_router;
pub use state::AppState;
