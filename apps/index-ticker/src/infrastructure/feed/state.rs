//! Feed Connection State
//!
//! Lifecycle state and counters shared between a subscription, its reader
//! task and the status server.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Subscription lifecycle.
///
/// `Idle → Connecting → Open → Closed`, with `Open ⇄ Reconnecting` only when
/// reconnect is enabled. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Created, `open` not called yet.
    Idle,
    /// Connecting to the endpoint.
    Connecting,
    /// Connected and delivering records.
    Open,
    /// Waiting to retry after a transport error.
    Reconnecting,
    /// Released; no further records will be delivered.
    Closed,
}

impl ConnectionState {
    /// Lowercase state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        }
    }

    /// Gauge value for metrics.
    #[must_use]
    pub const fn as_gauge(self) -> f64 {
        match self {
            Self::Idle => 0.0,
            Self::Connecting => 1.0,
            Self::Open => 2.0,
            Self::Reconnecting => 3.0,
            Self::Closed => 4.0,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of the feed counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedStats {
    /// Current lifecycle state.
    pub state: ConnectionState,
    /// Data frames received.
    pub messages_received: u64,
    /// Records handed to the sink.
    pub records_delivered: u64,
    /// Frames dropped because they could not be decoded.
    pub decode_failures: u64,
    /// Frames dropped because a record lacked a symbol.
    pub missing_symbol: u64,
    /// Reconnect attempts since start.
    pub reconnect_attempts: u64,
    /// Last time the feed reached `Open`.
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Last connection or transport error.
    pub last_error: Option<String>,
}

/// Shared feed state.
#[derive(Debug)]
pub struct FeedState {
    connection: RwLock<ConnectionState>,
    last_connected_at: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<String>>,
    messages_received: AtomicU64,
    records_delivered: AtomicU64,
    decode_failures: AtomicU64,
    missing_symbol: AtomicU64,
    reconnect_attempts: AtomicU64,
}

impl Default for FeedState {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedState {
    /// New state in `Idle`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connection: RwLock::new(ConnectionState::Idle),
            last_connected_at: RwLock::new(None),
            last_error: RwLock::new(None),
            messages_received: AtomicU64::new(0),
            records_delivered: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            missing_symbol: AtomicU64::new(0),
            reconnect_attempts: AtomicU64::new(0),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn connection(&self) -> ConnectionState {
        *self.connection.read()
    }

    /// Move to `next`. Returns `false` if the state is already `Closed`.
    pub fn transition(&self, next: ConnectionState) -> bool {
        let mut current = self.connection.write();
        if *current == ConnectionState::Closed {
            return false;
        }
        *current = next;
        drop(current);

        if next == ConnectionState::Open {
            *self.last_connected_at.write() = Some(Utc::now());
        }
        true
    }

    /// Record a terminal error and move to `Closed`.
    pub fn fail(&self, error: &impl fmt::Display) {
        self.record_error(error);
        self.transition(ConnectionState::Closed);
    }

    /// Remember an error without changing state.
    pub fn record_error(&self, error: &impl fmt::Display) {
        *self.last_error.write() = Some(error.to_string());
    }

    /// Count a received data frame.
    pub fn increment_messages(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Count records delivered to the sink.
    pub fn add_records(&self, count: u64) {
        self.records_delivered.fetch_add(count, Ordering::Relaxed);
    }

    /// Count an undecodable frame.
    pub fn increment_decode_failures(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a frame dropped for a missing symbol.
    pub fn increment_missing_symbol(&self) {
        self.missing_symbol.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a reconnect attempt.
    pub fn increment_reconnect_attempts(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of all counters.
    #[must_use]
    pub fn stats(&self) -> FeedStats {
        FeedStats {
            state: self.connection(),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            records_delivered: self.records_delivered.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            missing_symbol: self.missing_symbol.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            last_connected_at: *self.last_connected_at.read(),
            last_error: self.last_error.read().clone(),
        }
    }
}
