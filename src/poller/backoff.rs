//! Exponential backoff with jitter for poll intervals.

use rand::Rng;
use std::time::Duration;

/// Default first poll interval in milliseconds.
const DEFAULT_INITIAL_MS: u64 = 2000;

/// Default ceiling for the poll interval in milliseconds.
const DEFAULT_MAX_MS: u64 = 10_000;

/// Default random jitter added to each interval in milliseconds.
const DEFAULT_JITTER_MS: u64 = 250;

/// Largest exponent applied to the multiplier.
const MAX_EXPONENT: u32 = 16;

/// Interval policy between two polls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Interval before the second poll.
    pub initial: Duration,
    /// Upper bound for the exponential part of the interval.
    pub max: Duration,
    /// Growth factor applied per wait.
    pub multiplier: f64,
    /// Maximum random jitter added on top of the interval.
    pub jitter: Duration,
}

impl Backoff {
    /// Creates a backoff growing from `initial` up to `max`, doubling each time.
    #[must_use]
    pub const fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            multiplier: 2.0,
            jitter: Duration::ZERO,
        }
    }

    /// A fixed interval with no growth and no jitter.
    #[must_use]
    pub const fn fixed(interval: Duration) -> Self {
        Self {
            initial: interval,
            max: interval,
            multiplier: 1.0,
            jitter: Duration::ZERO,
        }
    }

    /// Sets the growth factor.
    #[must_use]
    pub const fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the maximum jitter.
    #[must_use]
    pub const fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Interval before the wait with the given zero-based index, jitter included.
    #[must_use]
    pub fn delay(&self, wait_index: u32) -> Duration {
        let base = self.base_delay(wait_index);
        if self.jitter.is_zero() {
            return base;
        }

        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }

    /// Interval without jitter.
    #[must_use]
    pub fn base_delay(&self, wait_index: u32) -> Duration {
        let exponent = wait_index.min(MAX_EXPONENT);
        let factor = self.multiplier.max(1.0).powi(i32::try_from(exponent).unwrap_or(i32::MAX));
        let cap = self.max.max(self.initial);

        // Compare in float seconds; the grown value may not fit in a Duration.
        let grown = self.initial.as_secs_f64() * factor;
        if !grown.is_finite() || grown >= cap.as_secs_f64() {
            return cap;
        }
        Duration::from_secs_f64(grown)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_INITIAL_MS),
            Duration::from_millis(DEFAULT_MAX_MS),
        )
        .with_jitter(Duration::from_millis(DEFAULT_JITTER_MS))
    }
}
