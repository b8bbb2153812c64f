// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Exponential backoff between throttled flush rounds.
//!
//! When the store answers with service-unavailable codes, or a whole batch
//! fails in transport, the next round waits before sending again. Each
//! consecutive throttled round doubles the wait up to a cap; a clean round
//! resets it.
//!
//! # Example
//!
//! ```
//! use buffered_sender::resilience::BackoffConfig;
//! use std::time::Duration;
//!
//! let backoff = BackoffConfig {
//!     initial_delay: Duration::from_millis(800),
//!     max_delay: Duration::from_secs(60),
//!     factor: 2.0,
//! };
//! assert_eq!(backoff.delay_for(1), Duration::from_millis(800));
//! assert_eq!(backoff.delay_for(2), Duration::from_millis(1600));
//! assert_eq!(backoff.delay_for(20), Duration::from_secs(60));
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{info, warn};

/// Backoff curve parameters.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl BackoffConfig {
    /// Fast backoff for tests (minimal delays)
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            factor: 2.0,
        }
    }

    /// Delay before the round following `consecutive` throttled rounds.
    /// Zero when `consecutive` is zero.
    #[must_use]
    pub fn delay_for(&self, consecutive: u32) -> Duration {
        if consecutive == 0 {
            return Duration::ZERO;
        }
        let mut delay = self.initial_delay;
        for _ in 1..consecutive {
            delay = delay.mul_f64(self.factor).min(self.max_delay);
            if delay >= self.max_delay {
                break;
            }
        }
        delay.min(self.max_delay)
    }
}

/// Tracks consecutive throttled rounds for one sender.
#[derive(Debug)]
pub struct Throttle {
    config: BackoffConfig,
    consecutive: AtomicU32,
}

impl Throttle {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            consecutive: AtomicU32::new(0),
        }
    }

    /// Record whether the round that just finished was throttled.
    pub fn record_round(&self, throttled: bool) {
        if throttled {
            let n = self.consecutive.fetch_add(1, Ordering::AcqRel).saturating_add(1);
            warn!(consecutive = n, next_delay = ?self.config.delay_for(n), "Round throttled by the store");
        } else {
            let previous = self.consecutive.swap(0, Ordering::AcqRel);
            if previous > 0 {
                info!(after_rounds = previous, "Store no longer throttling");
            }
        }
    }

    /// How long the next round should wait before sending.
    #[must_use]
    pub fn current_delay(&self) -> Duration {
        self.config.delay_for(self.consecutive.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn consecutive(&self) -> u32 {
        self.consecutive.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_exponential_backoff() {
        let config = BackoffConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            factor: 2.0,
        };

        assert_eq!(config.delay_for(0), Duration::ZERO);
        assert_eq!(config.delay_for(1), Duration::from_millis(100));
        assert_eq!(config.delay_for(2), Duration::from_millis(200));
        assert_eq!(config.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_caps_at_max() {
        let config = BackoffConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            factor: 10.0, // Aggressive factor
        };

        assert_eq!(config.delay_for(2), Duration::from_secs(5));
        assert_eq!(config.delay_for(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_throttle_tracks_and_resets() {
        let throttle = Throttle::new(BackoffConfig::test());
        assert_eq!(throttle.current_delay(), Duration::ZERO);

        throttle.record_round(true);
        assert_eq!(throttle.current_delay(), Duration::from_millis(1));

        throttle.record_round(true);
        assert_eq!(throttle.consecutive(), 2);
        assert_eq!(throttle.current_delay(), Duration::from_millis(2));

        throttle.record_round(false);
        assert_eq!(throttle.consecutive(), 0);
        assert_eq!(throttle.current_delay(), Duration::ZERO);
    }
}
