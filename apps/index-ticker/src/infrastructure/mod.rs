//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// WebSocket price feed adapter.
pub mod feed;

/// Configuration loaded from the environment.
pub mod config;

/// Status HTTP endpoint (health, metrics, snapshots).
pub mod status;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
