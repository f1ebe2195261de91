//! Index Ticker Binary
//!
//! Keeps live index snapshots current from a WebSocket price feed and serves
//! them over HTTP.
//!
//! # Usage
//!
//! ```bash
//! TICKER_FEED_URL=wss://feed.example.com/indices cargo run --bin index-ticker
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `TICKER_FEED_URL`: Price feed WebSocket endpoint (`ws://` or `wss://`)
//!
//! ## Optional
//! - `TICKER_HTTP_PORT`: Status and snapshot HTTP port (default: 8083)
//! - `TICKER_CONNECT_TIMEOUT_SECS`: Feed connect timeout (default: 10)
//! - `TICKER_RECONNECT_ENABLED`: Retry after transport errors (default: false)
//! - `TICKER_RECONNECT_DELAY_INITIAL_MS`: First retry delay (default: 500)
//! - `TICKER_RECONNECT_DELAY_MAX_SECS`: Retry delay cap (default: 30)
//! - `TICKER_RECONNECT_DELAY_MULTIPLIER`: Backoff factor (default: 2.0)
//! - `TICKER_MAX_RECONNECT_ATTEMPTS`: Retry cap, 0 = unlimited (default: 0)
//! - `OTEL_ENABLED`: Enable OpenTelemetry export (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: index-ticker)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use index_ticker::infrastructure::feed::{FeedConfig, FeedSubscription};
use index_ticker::infrastructure::telemetry;
use index_ticker::{
    EntityStore, SnapshotSync, StatusServer, StatusServerState, TickerConfig, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Bound on waiting for the status server after shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "failed to install rustls crypto provider")?;

    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let telemetry_guard = telemetry::init();

    tracing::info!(
        otlp_export = telemetry_guard.exporting(),
        "Starting Index Ticker"
    );

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = TickerConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Snapshot store, seeded so the first render has data
    let store = Arc::new(EntityStore::seeded());
    let sync = Arc::new(SnapshotSync::new(Arc::clone(&store)));
    #[allow(clippy::cast_precision_loss)]
    index_ticker::infrastructure::metrics::set_tracked_entities(store.len() as f64);

    let mut subscription = FeedSubscription::new(FeedConfig::from(&config.feed));

    // Status server
    let status_state = Arc::new(StatusServerState::new(
        env!("CARGO_PKG_VERSION"),
        Arc::clone(&sync),
        subscription.feed_state(),
    ));
    let status_server = StatusServer::new(
        config.server.http_port,
        status_state,
        shutdown_token.clone(),
    );
    let status_task = tokio::spawn(async move {
        if let Err(e) = status_server.run().await {
            tracing::error!(error = %e, "Status server error");
        }
    });

    // A failed open leaves the seeded snapshots in place; keep serving them
    let feed_running = match subscription.open(Arc::clone(&sync)).await {
        Ok(()) => {
            tracing::info!(
                feed_url = %subscription.url(),
                entities = store.len(),
                "Index ticker ready"
            );
            true
        }
        Err(e) => {
            tracing::error!(
                feed_url = %subscription.url(),
                error = %e,
                "Price feed unavailable, serving seed snapshots"
            );
            false
        }
    };

    // No reader task to join when the open failed
    let signalled = if feed_running {
        tokio::select! {
            () = await_shutdown() => true,
            result = subscription.join() => {
                match result {
                    Ok(()) => tracing::info!("Price feed stopped"),
                    Err(e) => tracing::error!(error = %e, "Price feed ended, serving last snapshots"),
                }
                false
            }
        }
    } else {
        false
    };

    // Keep serving the last known snapshots until asked to stop
    if !signalled {
        await_shutdown().await;
    }

    subscription.close().await;
    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, status_task).await.is_err() {
        tracing::warn!("Status server did not stop in time");
    }

    let stats = sync.stats();
    tracing::info!(
        created = stats.created,
        updated = stats.updated,
        unchanged = stats.unchanged,
        "Index ticker stopped"
    );
    Ok(())
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &TickerConfig) {
    tracing::info!(
        feed_url = %config.feed.url,
        http_port = config.server.http_port,
        connect_timeout_secs = config.feed.connect_timeout.as_secs(),
        reconnect = config.feed.reconnect.enabled,
        "Configuration loaded"
    );
    tracing::debug!(
        delay_initial_ms = config.feed.reconnect.delay_initial.as_millis(),
        delay_max_secs = config.feed.reconnect.delay_max.as_secs(),
        multiplier = config.feed.reconnect.delay_multiplier,
        max_attempts = config.feed.reconnect.max_attempts,
        "Reconnect settings"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
