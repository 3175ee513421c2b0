//! Retry policy for establishing daemon connections.
//!
//! Retries only ever cover the dial: once request bytes are on the wire a
//! failure is surfaced to the caller, never replayed.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Dial retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of dial attempts, including the first one.
    ///
    /// A value of `0` is treated as `1`.
    ///
    /// Default: 3
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential backoff (in milliseconds).
    ///
    /// The delay before attempt `n + 1` is `base * 2^(n - 1)`.
    ///
    /// Default: 100 ms
    #[serde(default = "defaults::base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound on the backoff delay (in milliseconds).
    ///
    /// Default: 2000 ms
    #[serde(default = "defaults::max_delay_ms")]
    pub max_delay_ms: u64,

    /// Delays are randomized within ±`jitter_factor`.
    ///
    /// Default: 0.1 (±10%)
    #[serde(default = "defaults::jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay_ms(),
            max_delay_ms: defaults::max_delay_ms(),
            jitter_factor: defaults::jitter_factor(),
        }
    }
}

impl RetryPolicy {
    /// Fixed delay between attempts, no jitter.
    #[must_use]
    pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let delay_ms = delay.as_millis() as u64;
        Self {
            max_attempts,
            base_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            jitter_factor: 0.0,
        }
    }

    /// Number of dial attempts to make, never less than one.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        if self.max_attempts == 0 {
            1
        } else {
            self.max_attempts
        }
    }

    /// Whether another dial may follow `attempt` (1-indexed) failed attempts.
    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.attempts()
    }

    /// Whether `jitter_factor` is a finite, non-negative number.
    #[must_use]
    pub fn has_valid_jitter(&self) -> bool {
        self.jitter_factor.is_finite() && self.jitter_factor >= 0.0
    }

    /// Delay to wait after the `attempt`-th failed dial (1-indexed).
    ///
    /// `delay = min(base * 2^(attempt - 1), max) * (1 ± jitter)`
    ///
    /// A jitter factor that is not a positive finite number disables jitter.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let delay = if exponent >= 63 {
            self.max_delay_ms
        } else {
            self.base_delay_ms
                .saturating_mul(1u64 << exponent)
                .min(self.max_delay_ms)
        };

        #[allow(clippy::cast_precision_loss)]
        let range = (delay as f64) * self.jitter_factor;
        if !range.is_finite() || range <= 0.0 {
            return Duration::from_millis(delay);
        }

        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let jittered = {
            let jitter: f64 = rand::rng().random_range(-range..=range);
            ((delay as f64) + jitter).max(0.0) as u64
        };

        Duration::from_millis(jittered)
    }
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        3
    }

    pub const fn base_delay_ms() -> u64 {
        100
    }

    pub const fn max_delay_ms() -> u64 {
        2_000
    }

    pub const fn jitter_factor() -> f64 {
        0.1
    }
}
