//! # Pacing for replacement workers.
//!
//! [`BackoffPolicy`] controls how long the supervisor waits before spawning a
//! replacement for a crashed worker. It is parameterized by:
//! - [`BackoffPolicy::first`] the delay after the first crash of a streak;
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! The delay for streak position `n` (0-indexed) is `first × factor^n`, clamped
//! to `max`, then jitter is applied. The base is derived purely from `n`, so
//! jitter output never feeds back into later delays.
//!
//! The default policy is [`BackoffPolicy::immediate`]: zero delay, every
//! replacement is spawned as soon as the exit is observed.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use procvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(100));
//! assert_eq!(backoff.next(1), Duration::from_millis(200));
//! // 100ms × 2^10 = 102_400ms → capped at max=10s
//! assert_eq!(backoff.next(10), Duration::from_secs(10));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Replacement backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first replacement of a crash streak.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Randomization applied to each delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Returns [`BackoffPolicy::immediate`].
    fn default() -> Self {
        Self::immediate()
    }
}

impl BackoffPolicy {
    /// No pacing: replacements are spawned without delay.
    pub const fn immediate() -> Self {
        Self {
            first: Duration::ZERO,
            max: Duration::ZERO,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// True when every delay this policy produces is zero.
    pub fn is_immediate(&self) -> bool {
        self.first.is_zero() || self.max.is_zero()
    }

    /// Computes the delay for streak position `attempt` (0-indexed).
    ///
    /// # Notes
    /// - `factor == 1.0` keeps the delay constant at `first` (up to `max`).
    /// - `factor > 1.0` grows the delay exponentially up to `max`.
    /// - Non-finite intermediate values clamp to `max`.
    pub fn next(&self, attempt: u32) -> Duration {
        if self.is_immediate() {
            return Duration::ZERO;
        }

        let max_secs = self.max.as_secs_f64();
        let clamped_exp = attempt.min(i32::MAX as u32) as i32;
        let unclamped_secs = self.first.as_secs_f64() * self.factor.powi(clamped_exp);

        let base =
            if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
                self.max
            } else {
                Duration::from_secs_f64(unclamped_secs)
            };

        self.jitter.apply(base)
    }
}
