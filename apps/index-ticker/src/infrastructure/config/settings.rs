//! Ticker Configuration Settings
//!
//! Configuration types for the ticker service, loaded from environment variables.

use std::time::Duration;

/// Reconnect settings for the price feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectSettings {
    /// Whether transport errors trigger reconnects (default: terminal).
    pub enabled: bool,
    /// Initial reconnection delay.
    pub delay_initial: Duration,
    /// Maximum reconnection delay.
    pub delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_initial: Duration::from_millis(500),
            delay_max: Duration::from_secs(30),
            delay_multiplier: 2.0,
            max_attempts: 0, // Unlimited
        }
    }
}

/// Price feed connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSettings {
    /// WebSocket endpoint.
    pub url: String,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Reconnect behavior.
    pub reconnect: ReconnectSettings,
}

impl FeedSettings {
    /// Settings for `url` with default timeouts and reconnect disabled.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectSettings::default(),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Status HTTP port (health, metrics, snapshots).
    pub http_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { http_port: 8083 }
    }
}

/// Complete ticker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerConfig {
    /// Price feed settings.
    pub feed: FeedSettings,
    /// Server port settings.
    pub server: ServerSettings,
}

impl TickerConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `TICKER_FEED_URL` is missing, empty, or not a
    /// WebSocket URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`TickerConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = lookup("TICKER_FEED_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("TICKER_FEED_URL".to_string()))?;

        let url = url.trim().to_string();
        if url.is_empty() {
            return Err(ConfigError::EmptyValue("TICKER_FEED_URL".to_string()));
        }
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ConfigError::InvalidValue {
                key: "TICKER_FEED_URL".to_string(),
                reason: "expected a ws:// or wss:// URL".to_string(),
            });
        }

        let defaults = FeedSettings::new(String::new());
        let reconnect_defaults = ReconnectSettings::default();

        let reconnect = ReconnectSettings {
            enabled: parse_bool(
                lookup("TICKER_RECONNECT_ENABLED"),
                reconnect_defaults.enabled,
            ),
            delay_initial: parse_duration_millis(
                lookup("TICKER_RECONNECT_DELAY_INITIAL_MS"),
                reconnect_defaults.delay_initial,
            ),
            delay_max: parse_duration_secs(
                lookup("TICKER_RECONNECT_DELAY_MAX_SECS"),
                reconnect_defaults.delay_max,
            ),
            delay_multiplier: parse_multiplier(
                lookup("TICKER_RECONNECT_DELAY_MULTIPLIER"),
                reconnect_defaults.delay_multiplier,
            )?,
            max_attempts: parse_or(
                lookup("TICKER_MAX_RECONNECT_ATTEMPTS"),
                reconnect_defaults.max_attempts,
            ),
        };

        let feed = FeedSettings {
            url,
            connect_timeout: parse_duration_secs(
                lookup("TICKER_CONNECT_TIMEOUT_SECS"),
                defaults.connect_timeout,
            ),
            reconnect,
        };

        let server = ServerSettings {
            http_port: parse_or(
                lookup("TICKER_HTTP_PORT"),
                ServerSettings::default().http_port,
            ),
        };

        Ok(Self { feed, server })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has an unusable value.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_multiplier(value: Option<String>, default: f64) -> Result<f64, ConfigError> {
    let Some(raw) = value else {
        return Ok(default);
    };
    match raw.trim().parse::<f64>() {
        Ok(multiplier) if multiplier.is_finite() && multiplier >= 1.0 => Ok(multiplier),
        _ => Err(ConfigError::InvalidValue {
            key: "TICKER_RECONNECT_DELAY_MULTIPLIER".to_string(),
            reason: format!("expected a finite number >= 1, got {raw:?}"),
        }),
    }
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    value.map_or(default, |v| {
        matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
    })
}

fn parse_duration_secs(value: Option<String>, default: Duration) -> Duration {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_duration_millis(value: Option<String>, default: Duration) -> Duration {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<TickerConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        TickerConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn missing_feed_url() {
        let err = config_from(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "TICKER_FEED_URL"));
    }

    #[test]
    fn empty_feed_url() {
        let err = config_from(&[("TICKER_FEED_URL", "  ")]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyValue(_)));
    }

    #[test]
    fn non_websocket_feed_url() {
        let err = config_from(&[("TICKER_FEED_URL", "https://feed.example.com")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert!(err.to_string().contains("TICKER_FEED_URL"));
    }

    #[test]
    fn defaults_applied() {
        let config = config_from(&[("TICKER_FEED_URL", "wss://feed.example.com/indices")]).unwrap();

        assert_eq!(config.feed.url, "wss://feed.example.com/indices");
        assert_eq!(config.feed.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.feed.reconnect, ReconnectSettings::default());
        assert_eq!(config.server.http_port, 8083);
    }

    #[test]
    fn overrides_applied() {
        let config = config_from(&[
            ("TICKER_FEED_URL", "ws://localhost:9001"),
            ("TICKER_HTTP_PORT", "9999"),
            ("TICKER_CONNECT_TIMEOUT_SECS", "3"),
            ("TICKER_RECONNECT_ENABLED", "TRUE"),
            ("TICKER_RECONNECT_DELAY_INITIAL_MS", "250"),
            ("TICKER_RECONNECT_DELAY_MAX_SECS", "5"),
            ("TICKER_RECONNECT_DELAY_MULTIPLIER", "1.5"),
            ("TICKER_MAX_RECONNECT_ATTEMPTS", "7"),
        ])
        .unwrap();

        assert_eq!(config.server.http_port, 9999);
        assert_eq!(config.feed.connect_timeout, Duration::from_secs(3));
        assert!(config.feed.reconnect.enabled);
        assert_eq!(config.feed.reconnect.delay_initial, Duration::from_millis(250));
        assert_eq!(config.feed.reconnect.delay_max, Duration::from_secs(5));
        assert!((config.feed.reconnect.delay_multiplier - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.feed.reconnect.max_attempts, 7);
    }

    #[test]
    fn backoff_multiplier_must_be_finite_and_at_least_one() {
        for bad in ["inf", "NaN", "1e400", "0.5", "fast"] {
            let err = config_from(&[
                ("TICKER_FEED_URL", "ws://localhost:9001"),
                ("TICKER_RECONNECT_DELAY_MULTIPLIER", bad),
            ])
            .unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "TICKER_RECONNECT_DELAY_MULTIPLIER"),
                "{bad} accepted"
            );
        }
    }

    #[test]
    fn unparsable_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("TICKER_FEED_URL", "ws://localhost:9001"),
            ("TICKER_HTTP_PORT", "not-a-port"),
            ("TICKER_RECONNECT_ENABLED", "maybe"),
        ])
        .unwrap();

        assert_eq!(config.server.http_port, 8083);
        assert!(!config.feed.reconnect.enabled);
    }
}
