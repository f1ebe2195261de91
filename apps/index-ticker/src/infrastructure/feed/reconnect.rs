//! Reconnect Backoff
//!
//! Exponential backoff with jitter for the opt-in feed reconnect mode.
//! Without a `ReconnectConfig` the feed treats transport errors as terminal.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::ReconnectSettings;

/// Backoff parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Growth factor applied after each retry.
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.1 = ±10%).
    pub jitter_factor: f64,
    /// Retry cap (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 0,
        }
    }
}

impl ReconnectConfig {
    /// Build from settings; `None` when reconnect is disabled.
    #[must_use]
    pub fn from_settings(settings: &ReconnectSettings) -> Option<Self> {
        settings.enabled.then(|| Self {
            initial_delay: settings.delay_initial,
            max_delay: settings.delay_max,
            multiplier: settings.delay_multiplier,
            max_attempts: settings.max_attempts,
            ..Self::default()
        })
    }
}

/// Stateful backoff sequence.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    next_base: Duration,
    attempts: u32,
}

impl ReconnectPolicy {
    /// Start a fresh sequence.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let next_base = config.initial_delay;
        Self {
            config,
            next_base,
            attempts: 0,
        }
    }

    /// Delay before the next retry, or `None` once the cap is reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.config.max_attempts > 0 && self.attempts >= self.config.max_attempts {
            return None;
        }
        self.attempts += 1;

        let delay = self.jittered(self.next_base);
        self.next_base = self.grown(self.next_base);

        Some(delay)
    }

    /// Restart the sequence after a successful reconnect.
    pub const fn reset(&mut self) {
        self.next_base = self.config.initial_delay;
        self.attempts = 0;
    }

    /// Retries handed out since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempts
    }

    /// Next base delay, saturating at `max_delay`.
    fn grown(&self, base: Duration) -> Duration {
        #[allow(clippy::cast_precision_loss)]
        let scaled = (base.as_millis() as f64 * self.config.multiplier.max(1.0)).round();
        let max_millis = self.config.max_delay.as_millis();

        let next_millis = if scaled.is_finite() && scaled >= 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let millis = scaled as u128;
            millis.min(max_millis)
        } else {
            max_millis
        };
        Duration::from_millis(u64::try_from(next_millis).unwrap_or(u64::MAX))
    }

    fn jittered(&self, base: Duration) -> Duration {
        if self.config.jitter_factor.is_nan() || self.config.jitter_factor <= 0.0 {
            return base;
        }
        let spread = self.config.jitter_factor.min(1.0);
        let factor = rand::rng().random_range((1.0 - spread)..=(1.0 + spread));
        Duration::try_from_secs_f64(base.as_secs_f64() * factor)
            .unwrap_or(base)
            .max(Duration::from_millis(1))
    }
}
