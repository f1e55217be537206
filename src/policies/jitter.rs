//! # Jitter policy for lock polling.
//!
//! [`JitterPolicy`] adds randomness to the interval between persistence lock
//! polls so that several writers blocked on the same lock do not wake up in lockstep.
//!
//! - [`JitterPolicy::None`]: exact interval, predictable timing
//! - [`JitterPolicy::Full`]: random interval in [0, interval]
//! - [`JitterPolicy::Equal`]: interval/2 + random[0, interval/2]

use rand::Rng;
use std::time::Duration;

/// Policy controlling randomization of poll intervals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// No jitter: sleep exactly the configured interval.
    #[default]
    None,

    /// Full jitter: random interval in [0, interval].
    Full,

    /// Equal jitter: interval/2 + random[0, interval/2].
    ///
    /// Never shortens the wait below half the configured interval.
    Equal,
}

impl JitterPolicy {
    /// Applies jitter to the given interval.
    pub fn apply(&self, interval: Duration) -> Duration {
        match self {
            JitterPolicy::None => interval,
            JitterPolicy::Full => full_jitter(interval),
            JitterPolicy::Equal => equal_jitter(interval),
        }
    }
}

fn full_jitter(interval: Duration) -> Duration {
    let ms = interval.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=ms))
}

fn equal_jitter(interval: Duration) -> Duration {
    let ms = interval.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    let half = ms / 2;
    let jitter = if half == 0 {
        0
    } else {
        rand::rng().random_range(0..=half)
    };
    Duration::from_millis(half + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        let d = Duration::from_secs(60);
        assert_eq!(JitterPolicy::None.apply(d), d);
    }

    #[test]
    fn full_jitter_bounds() {
        let d = Duration::from_millis(1000);
        for _ in 0..50 {
            assert!(JitterPolicy::Full.apply(d) <= d);
        }
    }

    #[test]
    fn equal_jitter_bounds() {
        let d = Duration::from_millis(1000);
        for _ in 0..50 {
            let got = JitterPolicy::Equal.apply(d);
            assert!(got >= Duration::from_millis(500));
            assert!(got <= d);
        }
    }

    #[test]
    fn zero_stays_zero() {
        assert_eq!(JitterPolicy::Full.apply(Duration::ZERO), Duration::ZERO);
        assert_eq!(JitterPolicy::Equal.apply(Duration::ZERO), Duration::ZERO);
    }
}
