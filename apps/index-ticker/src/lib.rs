#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Index Ticker - Live Index Snapshots
//!
//! Keeps the latest snapshot of a set of market index instruments and keeps
//! it current from a WebSocket price feed. Each feed message carries a
//! partial record that is merged into the stored snapshot by symbol.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Snapshot model and merge logic
//!   - `snapshot`: Instrument snapshots, partial records, seed data
//!   - `store`: Symbol-keyed store with merge semantics
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: `RecordSink`, the receiver of decoded feed records
//!   - `services`: `SnapshotSync`, applying records to the store
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `feed`: WebSocket subscription and JSON frame codec
//!   - `config`: Environment-driven configuration
//!   - `status`: Health, metrics and snapshot HTTP endpoint
//!   - `metrics`, `telemetry`: Prometheus and OpenTelemetry wiring
//!
//! # Data Flow
//!
//! ```text
//! Price feed WS ──► FeedSubscription ──► JsonCodec ──► RecordSink
//!                                                        │
//!                                        SnapshotSync ◄──┘
//!                                             │
//!                                        EntityStore ──► StatusServer ──► GET /snapshots
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Snapshot types and merge logic with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::snapshot::{EntitySnapshot, PartialRecord, Symbol, seed_snapshots};
pub use domain::store::{EntityStore, UpdateOutcome};

// Application
pub use application::ports::RecordSink;
pub use application::services::{SnapshotSync, SyncStats};

// Price feed
pub use infrastructure::feed::{
    CodecError, ConnectionState, FeedConfig, FeedError, FeedStats, FeedSubscription, JsonCodec,
    ReconnectConfig,
};

// Infrastructure config
pub use infrastructure::config::{
    ConfigError, FeedSettings, ReconnectSettings, ServerSettings, TickerConfig,
};

// Status server
pub use infrastructure::status::{StatusServer, StatusServerError, StatusServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
