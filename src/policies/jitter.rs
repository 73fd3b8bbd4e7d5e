//! # Jitter policy for retry delays.
//!
//! Adds randomness to backoff delays so that multiple processes retrying
//! against the same coordination store do not synchronize.

use std::time::Duration;

use rand::Rng;

/// Policy controlling randomization of retry delays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// No jitter: use the exact backoff delay.
    #[default]
    None,
    /// Full jitter: random delay in `[0, delay]`.
    Full,
    /// Equal jitter: `delay/2 + random[0, delay/2]`.
    Equal,
}

impl JitterPolicy {
    /// Applies jitter to the given delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = (delay.as_millis().min(u128::from(u64::MAX))) as u64;
        if ms == 0 {
            return Duration::ZERO;
        }

        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => {
                let mut rng = rand::rng();
                Duration::from_millis(rng.random_range(0..=ms))
            }
            JitterPolicy::Equal => {
                let half = ms / 2;
                let jitter = if half == 0 {
                    0
                } else {
                    rand::rng().random_range(0..=half)
                };
                Duration::from_millis(half + jitter)
            }
        }
    }
}
