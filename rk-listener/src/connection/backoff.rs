//! Reconnect backoff
//!
//! delay(n) = min(max_delay, min_delay * growth_factor^n) + uniform(0, jitter_max)
//!
//! `n` is the attempt number after increment, so the first retry already
//! uses one growth step.

use rand::{Rng, RngCore};
use std::time::Duration;

/// Ceiling-clamped exponential backoff with jitter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub growth_factor: f64,
    /// Upper bound (exclusive) of the random jitter added to each delay
    pub jitter_max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(600),
            max_delay: Duration::from_millis(6000),
            growth_factor: 1.6,
            jitter_max: Duration::from_millis(250),
        }
    }
}

impl BackoffConfig {
    /// Delay for `attempt` without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let grown = self.min_delay.as_secs_f64() * self.growth_factor.powf(attempt as f64);
        let capped = grown.min(self.max_delay.as_secs_f64());
        // Whole nanoseconds, rounded (600ms * 1.6 must come out as 960ms)
        Duration::from_nanos((capped * 1e9).round() as u64)
    }

    /// Delay for `attempt` including jitter drawn from `rng`
    pub fn delay(&self, attempt: u32, rng: &mut dyn RngCore) -> Duration {
        self.base_delay(attempt) + self.jitter(rng)
    }

    fn jitter(&self, rng: &mut dyn RngCore) -> Duration {
        let max_ms = self.jitter_max.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.gen_range(0..max_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_base_delay_growth() {
        let cfg = BackoffConfig::default();
        assert_eq!(cfg.base_delay(0).as_millis(), 600);
        assert_eq!(cfg.base_delay(1).as_millis(), 960);
        assert_eq!(cfg.base_delay(2).as_millis(), 1536);
        assert_eq!(cfg.base_delay(3).as_millis(), 2457);
    }

    #[test]
    fn test_base_delay_clamped_at_max() {
        let cfg = BackoffConfig::default();
        assert_eq!(cfg.base_delay(6), Duration::from_millis(6000));
        assert_eq!(cfg.base_delay(50), Duration::from_millis(6000));
        assert_eq!(cfg.base_delay(u32::MAX), Duration::from_millis(6000));
    }

    #[test]
    fn test_delay_within_jitter_window() {
        let cfg = BackoffConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        for attempt in 1..=20 {
            for _ in 0..50 {
                let base = cfg.base_delay(attempt);
                let delay = cfg.delay(attempt, &mut rng);
                assert!(delay >= base, "attempt {}: {:?} < {:?}", attempt, delay, base);
                assert!(delay <= base + cfg.jitter_max);
            }
        }
    }

    #[test]
    fn test_zero_jitter() {
        let cfg = BackoffConfig {
            jitter_max: Duration::ZERO,
            ..BackoffConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(cfg.delay(2, &mut rng), cfg.base_delay(2));
    }
}
