use thiserror::Error;

/// Application-wide error types.
///
/// Request-level failures (rate-limit rejections, timeouts, panics) are
/// answered directly by their middleware layers, and startup failures map
/// straight to exit codes in `main`, so the variants here only cover what
/// library code itself can produce.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
