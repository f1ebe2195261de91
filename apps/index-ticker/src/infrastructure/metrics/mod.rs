//! Prometheus Metrics Module
//!
//! Exposes ticker metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Feed**: frames received, decode failures, transport errors, reconnects
//! - **Store**: merge outcomes and tracked instrument count
//! - **Latency**: per-frame decode and merge time
//!
//! Metrics are exposed at `/metrics` on the status server port. Recording
//! before `init_metrics` is a no-op.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::domain::store::UpdateOutcome;
use crate::infrastructure::feed::ConnectionState;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if another global recorder is already installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "index_ticker_feed_messages_total",
        "Total data frames received from the price feed"
    );
    describe_counter!(
        "index_ticker_decode_failures_total",
        "Total feed frames dropped by reason"
    );
    describe_counter!(
        "index_ticker_feed_errors_total",
        "Total feed connection errors by type"
    );
    describe_counter!(
        "index_ticker_reconnects_total",
        "Total feed reconnection attempts"
    );
    describe_counter!(
        "index_ticker_merges_total",
        "Total records merged into the store by outcome"
    );

    describe_gauge!(
        "index_ticker_feed_state",
        "Feed lifecycle state (0 idle, 1 connecting, 2 open, 3 reconnecting, 4 closed)"
    );
    describe_gauge!(
        "index_ticker_tracked_entities",
        "Number of instruments in the store"
    );

    describe_histogram!(
        "index_ticker_frame_processing_seconds",
        "Time to decode a frame and merge its records"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a data frame received from the feed.
pub fn record_message_received() {
    counter!("index_ticker_feed_messages_total").increment(1);
}

/// Record a dropped frame.
pub fn record_decode_failure(reason: &'static str) {
    counter!("index_ticker_decode_failures_total", "reason" => reason).increment(1);
}

/// Record a feed connection error.
pub fn record_feed_error(error_type: &'static str) {
    counter!("index_ticker_feed_errors_total", "error_type" => error_type).increment(1);
}

/// Record a reconnect attempt.
pub fn record_reconnect() {
    counter!("index_ticker_reconnects_total").increment(1);
}

/// Record a merge outcome.
pub fn record_merge(outcome: UpdateOutcome) {
    counter!("index_ticker_merges_total", "outcome" => outcome.as_str()).increment(1);
}

/// Update the feed state gauge.
pub fn set_connection_state(state: ConnectionState) {
    gauge!("index_ticker_feed_state").set(state.as_gauge());
}

/// Update the tracked instrument count.
pub fn set_tracked_entities(count: f64) {
    gauge!("index_ticker_tracked_entities").set(count);
}

/// Record frame processing duration.
pub fn record_processing_duration(duration: Duration) {
    histogram!("index_ticker_frame_processing_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        record_message_received();
        record_decode_failure("json");
        record_merge(UpdateOutcome::Created);
        set_connection_state(ConnectionState::Open);
        record_processing_duration(Duration::from_micros(5));
    }

    #[test]
    fn state_gauge_values_are_distinct() {
        let states = [
            ConnectionState::Idle,
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Reconnecting,
            ConnectionState::Closed,
        ];
        for (i, state) in states.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let expected = i as f64;
            assert!((state.as_gauge() - expected).abs() < f64::EPSILON);
        }
    }
}
