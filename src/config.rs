//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with sensible defaults
//! for development. In production, configure via environment variables or a `.env` file.
//!
//! # Deployment Notes
//!
//! - `PORT`: cloud runtimes (Cloud Run and friends) inject this; defaults to 8080
//! - `TRUST_MODEL`: which proxy header the address resolver trusts. Must match
//!   the proxy actually fronting the service; trusting the wrong header allows
//!   address spoofing.
//!
//! # Rate Limiting
//!
//! - `RATE_LIMIT_CAPACITY`: admissions per window per client (default: 120, 0 disables)
//! - `RATE_LIMIT_WINDOW_SECS`: window length (default: 60)

use std::env;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::resolver::TrustModel;

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 8080)
    pub port: u16,

    // =========================================================================
    // Address Resolution Configuration
    // =========================================================================
    /// Which proxy header the resolver trusts for the client address.
    /// Exactly one model is active per deployment.
    pub trust_model: TrustModel,

    // =========================================================================
    // Rate Limiting Configuration
    // =========================================================================
    /// Admissions allowed per client per window (default: 120)
    /// Set to 0 to disable rate limiting
    pub rate_limit_capacity: u32,

    /// Fixed window length for the rate limiter (default: 60 seconds)
    pub rate_limit_window: Duration,

    // =========================================================================
    // Request Lifecycle Configuration
    // =========================================================================
    /// Wall-clock budget for a single request (default: 10 seconds)
    pub request_timeout: Duration,

    /// How long in-flight requests may keep running after a termination
    /// signal before being forcibly closed (default: 10 seconds)
    pub shutdown_grace: Duration,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log level (e.g., "info", "debug", "trace")
    pub log_level: String,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if any configuration value is invalid
    /// (e.g., non-numeric PORT value, unknown TRUST_MODEL).
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 8080)?,

            // Address resolution
            trust_model: Self::parse_trust_model()?,

            // Rate limiting
            rate_limit_capacity: Self::parse_env("RATE_LIMIT_CAPACITY", 120)?,
            rate_limit_window: Duration::from_secs(Self::parse_env("RATE_LIMIT_WINDOW_SECS", 60)?),

            // Request lifecycle
            request_timeout: Duration::from_secs(Self::parse_env("REQUEST_TIMEOUT_SECS", 10)?),
            shutdown_grace: Duration::from_secs(Self::parse_env("SHUTDOWN_GRACE_SECS", 10)?),

            // Observability
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            metrics_port: Self::parse_env("METRICS_PORT", 9090)?,
        };

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    fn validate(&self) -> AppResult<()> {
        if self.rate_limit_window.is_zero() {
            return Err(AppError::ConfigError(
                "RATE_LIMIT_WINDOW_SECS must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "REQUEST_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.shutdown_grace.is_zero() {
            return Err(AppError::ConfigError(
                "SHUTDOWN_GRACE_SECS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if rate limiting is enabled.
    pub fn rate_limiting_enabled(&self) -> bool {
        self.rate_limit_capacity > 0
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        if self.metrics_enabled() {
            Some(std::net::SocketAddr::from((
                [0, 0, 0, 0],
                self.metrics_port,
            )))
        } else {
            None
        }
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr + ToString,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Parse the trust model selection from `TRUST_MODEL`.
    ///
    /// Accepted values: "x-forwarded-for" (multi-hop forwarding chain, the
    /// default) and "x-real-ip" (single dedicated edge-proxy header).
    fn parse_trust_model() -> AppResult<TrustModel> {
        match env::var("TRUST_MODEL") {
            Ok(val) => val
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid TRUST_MODEL: {e}"))),
            Err(_) => Ok(TrustModel::default()),
        }
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Server
            host: "0.0.0.0".to_string(),
            port: 8080,
            // Address resolution
            trust_model: TrustModel::default(),
            // Rate limiting
            rate_limit_capacity: 120,
            rate_limit_window: Duration::from_secs(60),
            // Request lifecycle
            request_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(10),
            // Observability
            log_level: "info".to_string(),
            metrics_port: 9090,
        }
    }
}
