//! Feed Subscription
//!
//! Owns one WebSocket connection to the price feed. Each inbound frame is
//! decoded into partial records which are handed to a `RecordSink`.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──open()──► Connecting ──ok──► Open ──close() / remote close / error──► Closed
//!                      │                │
//!                      └──error──► Closed  (Open ⇄ Reconnecting when reconnect is enabled)
//! ```
//!
//! `close()` cancels the reader task and waits for it, so the sink is never
//! invoked after it returns. Dropping the subscription cancels the reader.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::codec::{CodecError, JsonCodec};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use super::state::{ConnectionState, FeedState, FeedStats};
use crate::application::ports::RecordSink;
use crate::infrastructure::config::FeedSettings;
use crate::infrastructure::metrics;

type FeedStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Bound on the best-effort close frame at shutdown.
const CLOSE_FRAME_TIMEOUT: Duration = Duration::from_secs(1);

// =============================================================================
// Error Type
// =============================================================================

/// Errors that can occur in the feed subscription.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// WebSocket connection could not be established.
    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    /// Connect did not complete within the configured timeout.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Transport error while open.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The remote side closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// `open` called on a subscription that is not idle.
    #[error("subscription cannot be opened from state {0}")]
    InvalidState(ConnectionState),

    /// Maximum reconnection attempts exceeded.
    #[error("maximum reconnection attempts exceeded")]
    MaxReconnectAttemptsExceeded,

    /// The reader task panicked or was aborted.
    #[error("feed reader failed: {0}")]
    ReaderFailed(String),
}

impl FeedError {
    /// Short label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionFailed(_) | Self::ConnectTimeout(_) => "connect",
            Self::WebSocket(_) => "transport",
            Self::ConnectionClosed => "remote_close",
            Self::InvalidState(_) => "invalid_state",
            Self::MaxReconnectAttemptsExceeded => "reconnect_exhausted",
            Self::ReaderFailed(_) => "reader",
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a feed subscription.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket endpoint (`ws://` or `wss://`).
    pub url: String,
    /// Bound on the connect phase.
    pub connect_timeout: Duration,
    /// Reconnect backoff; `None` makes transport errors terminal.
    pub reconnect: Option<ReconnectConfig>,
}

impl FeedConfig {
    /// Terminal-on-error configuration with a 10 second connect timeout.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(10),
            reconnect: None,
        }
    }

    /// Enable reconnect with the given backoff.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = Some(reconnect);
        self
    }

    /// Override the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl From<&FeedSettings> for FeedConfig {
    fn from(settings: &FeedSettings) -> Self {
        Self {
            url: settings.url.clone(),
            connect_timeout: settings.connect_timeout,
            reconnect: ReconnectConfig::from_settings(&settings.reconnect),
        }
    }
}

// =============================================================================
// Feed Subscription
// =============================================================================

/// A single subscription to the price feed.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use index_ticker::domain::store::EntityStore;
/// use index_ticker::infrastructure::feed::{FeedConfig, FeedSubscription};
///
/// # async fn run() -> Result<(), index_ticker::infrastructure::feed::FeedError> {
/// let store = Arc::new(EntityStore::seeded());
/// let mut subscription = FeedSubscription::new(FeedConfig::new("ws://127.0.0.1:9001"));
///
/// subscription.open(Arc::clone(&store)).await?;
/// // ... store is updated as frames arrive ...
/// subscription.close().await;
/// # Ok(())
/// # }
/// ```
pub struct FeedSubscription {
    config: FeedConfig,
    codec: JsonCodec,
    state: Arc<FeedState>,
    cancel: CancellationToken,
    reader: Option<JoinHandle<Result<(), FeedError>>>,
}

impl FeedSubscription {
    /// Create an idle subscription.
    #[must_use]
    pub fn new(config: FeedConfig) -> Self {
        Self {
            config,
            codec: JsonCodec::new(),
            state: Arc::new(FeedState::new()),
            cancel: CancellationToken::new(),
            reader: None,
        }
    }

    /// Connect and start delivering records to `sink`.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::InvalidState` if the subscription is not idle,
    /// or a connect error if the endpoint cannot be reached. A failed open
    /// leaves the subscription `Closed`.
    pub async fn open<S>(&mut self, sink: Arc<S>) -> Result<(), FeedError>
    where
        S: RecordSink + 'static,
    {
        let current = self.state.connection();
        if current != ConnectionState::Idle {
            return Err(FeedError::InvalidState(current));
        }

        self.set_state(ConnectionState::Connecting);
        tracing::info!(url = %self.config.url, "Connecting to price feed");

        let stream = match connect(&self.config).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(url = %self.config.url, error = %e, "Price feed connection failed");
                metrics::record_feed_error(e.kind());
                self.state.fail(&e);
                metrics::set_connection_state(ConnectionState::Closed);
                return Err(e);
            }
        };

        self.set_state(ConnectionState::Open);
        tracing::info!(url = %self.config.url, "Price feed connected");

        let reader = FeedReader {
            config: self.config.clone(),
            codec: self.codec,
            state: Arc::clone(&self.state),
            sink,
            cancel: self.cancel.clone(),
        };
        self.reader = Some(tokio::spawn(reader.run(stream)));

        Ok(())
    }

    /// Release the connection.
    ///
    /// Safe to call in any state and more than once. After it returns the
    /// sink receives no further records.
    pub async fn close(&mut self) {
        self.cancel.cancel();

        if let Some(reader) = self.reader.take() {
            match reader.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(error = %e, "Feed reader had already stopped"),
                Err(e) => tracing::warn!(error = %e, "Feed reader task failed"),
            }
        }

        if self.set_state(ConnectionState::Closed) {
            tracing::info!(url = %self.config.url, "Price feed subscription closed");
        }
    }

    /// Wait for the reader to stop on its own.
    ///
    /// Returns immediately when no reader is running. Cancel-safe: if the
    /// returned future is dropped, `close` still waits for the reader.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the reader.
    pub async fn join(&mut self) -> Result<(), FeedError> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(());
        };
        let result = reader.await;
        self.reader = None;

        result.map_err(|e| FeedError::ReaderFailed(e.to_string()))?
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.connection()
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> FeedStats {
        self.state.stats()
    }

    /// Shared state handle for the status server.
    #[must_use]
    pub fn feed_state(&self) -> Arc<FeedState> {
        Arc::clone(&self.state)
    }

    /// The endpoint this subscription targets.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Apply a state change. Returns `true` if it took effect; `Closed` is sticky.
    fn set_state(&self, next: ConnectionState) -> bool {
        let applied = self.state.transition(next);
        if applied {
            metrics::set_connection_state(next);
        }
        applied
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for FeedSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSubscription")
            .field("url", &self.config.url)
            .field("state", &self.state.connection())
            .field("reader_running", &self.reader.is_some())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Reader Task
// =============================================================================

/// Connect to the feed endpoint within the configured timeout.
async fn connect(config: &FeedConfig) -> Result<FeedStream, FeedError> {
    let attempt = tokio_tungstenite::connect_async(config.url.as_str());

    match tokio::time::timeout(config.connect_timeout, attempt).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(FeedError::ConnectionFailed(e.to_string())),
        Err(_elapsed) => Err(FeedError::ConnectTimeout(config.connect_timeout)),
    }
}

/// Reads frames until cancelled or the connection ends.
struct FeedReader<S: ?Sized> {
    config: FeedConfig,
    codec: JsonCodec,
    state: Arc<FeedState>,
    sink: Arc<S>,
    cancel: CancellationToken,
}

impl<S> FeedReader<S>
where
    S: RecordSink + ?Sized,
{
    async fn run(self, stream: FeedStream) -> Result<(), FeedError> {
        let mut policy = self.config.reconnect.clone().map(ReconnectPolicy::new);
        let mut stream = stream;

        loop {
            let error = match self.read_frames(stream).await {
                Ok(()) => {
                    self.finish(ConnectionState::Closed);
                    return Ok(());
                }
                Err(e) => e,
            };

            tracing::warn!(url = %self.config.url, error = %error, "Price feed connection lost");
            metrics::record_feed_error(error.kind());

            let Some(policy) = policy.as_mut() else {
                self.state.fail(&error);
                metrics::set_connection_state(ConnectionState::Closed);
                return Err(error);
            };
            self.state.record_error(&error);

            match self.reconnect(policy).await {
                Ok(Some(next)) => stream = next,
                Ok(None) => {
                    self.finish(ConnectionState::Closed);
                    return Ok(());
                }
                Err(e) => {
                    tracing::error!(url = %self.config.url, error = %e, "Giving up on price feed");
                    self.state.fail(&e);
                    metrics::set_connection_state(ConnectionState::Closed);
                    return Err(e);
                }
            }
        }
    }

    /// Retry with backoff. `Ok(None)` means cancelled while waiting.
    async fn reconnect(
        &self,
        policy: &mut ReconnectPolicy,
    ) -> Result<Option<FeedStream>, FeedError> {
        loop {
            let Some(delay) = policy.next_delay() else {
                return Err(FeedError::MaxReconnectAttemptsExceeded);
            };
            let attempt = policy.attempt_count();

            self.finish(ConnectionState::Reconnecting);
            self.state.increment_reconnect_attempts();
            metrics::record_reconnect();
            tracing::info!(
                attempt,
                delay_ms = delay.as_millis(),
                "Reconnecting to price feed"
            );

            tokio::select! {
                () = self.cancel.cancelled() => return Ok(None),
                () = tokio::time::sleep(delay) => {}
            }

            let result = tokio::select! {
                () = self.cancel.cancelled() => return Ok(None),
                result = connect(&self.config) => result,
            };

            match result {
                Ok(stream) => {
                    policy.reset();
                    self.finish(ConnectionState::Open);
                    tracing::info!(attempt, "Price feed reconnected");
                    return Ok(Some(stream));
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Reconnect attempt failed");
                    metrics::record_feed_error(e.kind());
                    self.state.record_error(&e);
                }
            }
        }
    }

    /// Pump frames from one connection. `Ok(())` means cancelled.
    async fn read_frames(&self, stream: FeedStream) -> Result<(), FeedError> {
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    let _ = tokio::time::timeout(
                        CLOSE_FRAME_TIMEOUT,
                        write.send(Message::Close(None)),
                    )
                    .await;
                    return Ok(());
                }
                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()),
                        Some(Ok(Message::Binary(data))) => {
                            if let Ok(text) = std::str::from_utf8(&data) {
                                self.handle_text(text);
                            } else {
                                self.state.increment_messages();
                                metrics::record_message_received();
                                self.state.increment_decode_failures();
                                metrics::record_decode_failure("format");
                                tracing::debug!(len = data.len(), "Dropping non-UTF-8 binary frame");
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("Feed server sent close frame");
                            return Err(FeedError::ConnectionClosed);
                        }
                        Some(Ok(_)) => {
                            // Pong and raw frames carry no records
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => return Err(FeedError::ConnectionClosed),
                    }
                }
            }
        }
    }

    /// Decode one frame and forward its records.
    fn handle_text(&self, text: &str) {
        let started = Instant::now();
        self.state.increment_messages();
        metrics::record_message_received();

        match self.codec.decode(text) {
            Ok(records) => {
                let count = records.len() as u64;
                for record in records {
                    self.sink.on_record(record);
                }
                self.state.add_records(count);
                metrics::record_processing_duration(started.elapsed());
            }
            Err(CodecError::MissingSymbol) => {
                self.state.increment_missing_symbol();
                metrics::record_decode_failure(CodecError::MissingSymbol.reason());
                tracing::warn!(frame_len = text.len(), "Dropping feed record without symbol");
            }
            Err(e) => {
                self.state.increment_decode_failures();
                metrics::record_decode_failure(e.reason());
                tracing::debug!(error = %e, "Dropping undecodable feed frame");
            }
        }
    }

    fn finish(&self, next: ConnectionState) {
        if self.state.transition(next) {
            metrics::set_connection_state(next);
        }
    }
}
