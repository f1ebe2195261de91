//! Logging and Trace Export
//!
//! Console logging through `tracing-subscriber`, with optional span export to
//! an OTLP collector.
//!
//! # Environment Variables
//!
//! - `OTEL_ENABLED`: "true" exports spans over OTLP (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: collector endpoint (default: http://localhost:4318)
//! - `OTEL_SERVICE_NAME`: service name on exported spans (default: index-ticker)
//! - `RUST_LOG`: extra filter directives, applied on top of the defaults
//!
//! Keep the returned [`TelemetryGuard`] alive for the life of the process;
//! dropping it flushes pending spans.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_SERVICE_NAME: &str = "index-ticker";
const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4318";

/// Default filter directives; `RUST_LOG` entries are added after these.
const DEFAULT_DIRECTIVES: [&str; 3] = ["index_ticker=info", "tungstenite=warn", "hyper=warn"];

/// Flushes and shuts down the span exporter on drop.
#[derive(Debug)]
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    /// Whether spans are being exported.
    #[must_use]
    pub const fn exporting(&self) -> bool {
        self.provider.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("OpenTelemetry shutdown failed: {e}");
        }
    }
}

/// Telemetry settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Export spans over OTLP.
    pub enabled: bool,
    /// Collector endpoint.
    pub otlp_endpoint: String,
    /// Service name attached to exported spans.
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Read settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            enabled: lookup("OTEL_ENABLED").is_some_and(|v| v.trim().eq_ignore_ascii_case("true")),
            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.otlp_endpoint),
            service_name: lookup("OTEL_SERVICE_NAME")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.service_name),
        }
    }
}

/// Install the global subscriber using settings from the environment.
#[must_use]
pub fn init() -> TelemetryGuard {
    init_with_config(&TelemetryConfig::from_env())
}

/// Install the global subscriber.
///
/// If the OTLP exporter cannot be built, console logging is still installed
/// and a warning is logged.
#[must_use]
pub fn init_with_config(config: &TelemetryConfig) -> TelemetryGuard {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);
    let registry = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt_layer);

    if !config.enabled {
        registry.init();
        return TelemetryGuard { provider: None };
    }

    match tracer_provider(config) {
        Ok(provider) => {
            let tracer = provider.tracer(config.service_name.clone());
            registry
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .init();
            tracing::info!(endpoint = %config.otlp_endpoint, "Exporting spans over OTLP");
            TelemetryGuard {
                provider: Some(provider),
            }
        }
        Err(e) => {
            registry.init();
            tracing::warn!(
                endpoint = %config.otlp_endpoint,
                error = %e,
                "OTLP exporter unavailable, logging to console only"
            );
            TelemetryGuard { provider: None }
        }
    }
}

fn env_filter() -> EnvFilter {
    filter_with(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())
}

/// Defaults first, then `rust_log`; a later directive for the same target wins.
fn filter_with(rust_log: Option<&str>) -> EnvFilter {
    let mut directives = DEFAULT_DIRECTIVES.join(",");
    if let Some(extra) = rust_log.map(str::trim).filter(|v| !v.is_empty()) {
        directives.push(',');
        directives.push_str(extra);
    }
    EnvFilter::builder().parse_lossy(directives)
}

fn tracer_provider(
    config: &TelemetryConfig,
) -> Result<SdkTracerProvider, opentelemetry_otlp::ExporterBuildError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()?;

    let resource = opentelemetry_sdk::Resource::builder()
        .with_service_name(config.service_name.clone())
        .build();

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}
