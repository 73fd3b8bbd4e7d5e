//! # Backoff policy for coordination publish retries.
//!
//! [`BackoffPolicy`] controls how retry delays grow after repeated store
//! failures. Parameterized by the initial delay, a multiplicative growth
//! factor, and a maximum cap; [`JitterPolicy`] optionally randomizes the
//! result to avoid synchronized retries across processes.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use taskherd::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(None), Duration::from_millis(100));
//! assert_eq!(
//!     backoff.next(Some(Duration::from_millis(100))),
//!     Duration::from_millis(200),
//! );
//! // Capped at max.
//! assert_eq!(backoff.next(Some(Duration::from_secs(20))), Duration::from_secs(10));
//! ```

use std::time::Duration;

use super::jitter::JitterPolicy;

/// Retry backoff policy.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Initial delay before the first retry.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Jitter applied to the computed delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 200ms`, `max = 15s`, `factor = 2.0`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(200),
            max: Duration::from_secs(15),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Computes the next delay from the previous one.
    ///
    /// `None` yields `first` clamped to `max`; otherwise the previous delay is
    /// multiplied by `factor` and capped at `max`.
    pub fn next(&self, prev: Option<Duration>) -> Duration {
        let unclamped = match prev {
            None => self.first,
            Some(d) => {
                let grown = d.as_secs_f64() * self.factor;
                if grown.is_finite() {
                    d.mul_f64(self.factor)
                } else {
                    self.max
                }
            }
        };

        self.jitter.apply(unclamped.min(self.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_factor_keeps_delay_flat() {
        let b = BackoffPolicy {
            first: Duration::from_millis(50),
            max: Duration::from_secs(1),
            factor: 1.0,
            jitter: JitterPolicy::None,
        };
        let d1 = b.next(None);
        let d2 = b.next(Some(d1));
        assert_eq!(d1, d2);
    }

    #[test]
    fn growth_is_capped() {
        let b = BackoffPolicy {
            first: Duration::from_millis(500),
            max: Duration::from_secs(2),
            factor: 10.0,
            jitter: JitterPolicy::None,
        };
        let d = b.next(Some(Duration::from_secs(1)));
        assert_eq!(d, Duration::from_secs(2));
    }
}
