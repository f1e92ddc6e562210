//! Shared application state.
//!
//! Bundles the configuration and the injectable rate limiter that the router
//! builder wires into the middleware chain. The limiter is owned here rather
//! than living as ambient global state, so tests can spin up fully isolated
//! instances.
//!
//! # Structured Concurrency
//!
//! The limiter's window-sweep task is managed with `tokio_util::task::TaskTracker`
//! and a `CancellationToken`. Call `shutdown()` to stop it before exit.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::config::Config;
use crate::middleware::RateLimiter;

/// Shared application state.
///
/// Cloned into the router builder; all internal data is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Fixed-window admission counter, injected into the middleware chain
    pub limiter: RateLimiter,
    /// Timestamp when the application started
    pub started_at: Instant,
    /// Tracks spawned background tasks for graceful shutdown
    task_tracker: TaskTracker,
    /// Cancellation token for signaling background tasks to stop
    cancellation_token: CancellationToken,
}

impl AppState {
    /// Create application state from configuration.
    ///
    /// Spawns the limiter's background sweep task; call [`Self::shutdown`]
    /// to terminate it cleanly.
    pub fn new(config: Config) -> Self {
        let limiter = RateLimiter::new(config.rate_limit_capacity, config.rate_limit_window);

        let state = Self {
            config: Arc::new(config),
            limiter,
            started_at: Instant::now(),
            task_tracker: TaskTracker::new(),
            cancellation_token: CancellationToken::new(),
        };

        state.spawn_sweep_task();

        state
    }

    /// Spawn the background task that evicts expired rate-limit windows.
    ///
    /// Sweeping is housekeeping only - an expired window would be reset on
    /// its next check anyway - so the interval is simply one window length.
    fn spawn_sweep_task(&self) {
        let limiter = self.limiter.clone();
        let cancel = self.cancellation_token.clone();

        self.task_tracker.spawn(async move {
            let mut ticker = interval(limiter.window());
            ticker.tick().await; // Skip the first immediate tick

            loop {
                tokio::select! {
                    biased; // Check cancellation first

                    _ = cancel.cancelled() => {
                        debug!("Window sweep task received cancellation signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        limiter.sweep();
                        debug!(tracked_keys = limiter.tracked_keys(), "Swept expired rate-limit windows");
                    }
                }
            }
        });
    }

    /// Gracefully shutdown background tasks.
    pub async fn shutdown(&self) {
        info!("Stopping background tasks");

        self.cancellation_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("All background tasks have completed");
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
