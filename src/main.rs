use std::future::IntoFuture;
use std::net::SocketAddr;
use std::pin::pin;
use std::process::ExitCode;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ipecho::{AppState, Config, build_router, metrics, utils};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("Starting ipecho v{}", env!("CARGO_PKG_VERSION"));

    match run().await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// Run the application, returning an exit code on error.
async fn run() -> Result<(), exitcode::ExitCode> {
    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {e}");
        exitcode::CONFIG
    })?;
    info!(
        host = %config.host,
        port = %config.port,
        trust_model = %config.trust_model,
        "Configuration loaded"
    );

    // Metrics exporter on its own listener
    if let Some(metrics_addr) = config.metrics_addr() {
        metrics::init_metrics(metrics_addr).map_err(|e| {
            error!("Failed to initialize metrics: {e}");
            exitcode::UNAVAILABLE
        })?;
        info!("Metrics available on http://{metrics_addr}");
    }

    let shutdown_grace = config.shutdown_grace;
    let addr = config.server_addr();

    // Build application state and router
    let state = AppState::new(config);
    let app = build_router(&state);

    // Bind; failure here is fatal
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        error!("Failed to bind to {addr}: {e}");
        exitcode::UNAVAILABLE
    })?;

    info!("Server listening on http://{addr}");
    info!("API endpoints:");
    info!("  GET  /health - Health check (never rate-limited)");
    info!("  GET  /       - Client IP, plaintext");
    info!("  GET  /json   - Client IP, JSON");

    // Signal task flips the token; the server then stops accepting and drains
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        let signal = utils::shutdown_signal().await;
        info!(signal, "Termination signal received; draining connections");
        signal_token.cancel();
    });

    // One task per connection; the peer address feeds the resolver
    let mut server = pin!(
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .into_future()
    );

    tokio::select! {
        // Listener died without an intentional shutdown - fatal
        result = &mut server => {
            result.map_err(|e| {
                error!("Server error: {e}");
                exitcode::SOFTWARE
            })?;
        }
        // Draining: in-flight requests get the grace period, then we exit anyway
        _ = shutdown.cancelled() => {
            match tokio::time::timeout(shutdown_grace, &mut server).await {
                Ok(Ok(())) => info!("Server stopped gracefully"),
                Ok(Err(e)) => {
                    error!("Server error during drain: {e}");
                    return Err(exitcode::SOFTWARE);
                }
                Err(_) => warn!(
                    grace_secs = shutdown_grace.as_secs(),
                    "Grace period elapsed; closing remaining connections"
                ),
            }
        }
    }

    // Stop the limiter's background sweep task
    state.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}
