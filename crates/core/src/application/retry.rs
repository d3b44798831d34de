// Backoff after transient backend failures
//
// Per-job retry accounting lives in the store (`record_failure`); this only
// paces the execution loop when the endpoint itself looks unhealthy.

use crate::application::worker::constants::BACKOFF_JITTER_PERCENT;
use crate::config::WorkerConfig;
use std::time::Duration;

/// Exponential backoff: `base * 2^(n-1)` with deterministic jitter, capped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    base_ms: u64,
    max_ms: u64,
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base_ms: base.as_millis() as u64,
            max_ms: max.as_millis() as u64,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            base_ms: config.backoff_base_ms,
            max_ms: config.backoff_max_ms,
        }
    }

    /// Pause before the next lease after `consecutive_failures` transient
    /// failures in a row. Zero failures means no pause.
    ///
    /// `seed` keeps the jitter stable per worker, so two workers sharing an
    /// endpoint drift apart instead of retrying in lockstep.
    pub fn delay(&self, consecutive_failures: u32, seed: &str) -> Duration {
        if consecutive_failures == 0 {
            return Duration::ZERO;
        }

        let exponent = (consecutive_failures - 1).min(32);
        let raw = self.base_ms.saturating_mul(1u64 << exponent);

        // 90..=110 percent of the raw delay
        let seed_sum: u64 = seed.chars().map(|c| c as u64).sum::<u64>() + consecutive_failures as u64;
        let spread = 2 * BACKOFF_JITTER_PERCENT + 1;
        let factor = 100 - BACKOFF_JITTER_PERCENT + seed_sum % spread;
        let jittered = raw.saturating_mul(factor) / 100;

        Duration::from_millis(jittered.min(self.max_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(Duration::from_millis(1_000), Duration::from_millis(60_000))
    }

    #[test]
    fn test_no_failures_no_delay() {
        assert_eq!(policy().delay(0, "gantry-a"), Duration::ZERO);
    }

    #[test]
    fn test_delay_grows_exponentially_within_jitter() {
        let p = policy();
        for (n, expected) in [(1u32, 1_000u64), (2, 2_000), (3, 4_000), (4, 8_000)] {
            let ms = p.delay(n, "gantry-a").as_millis() as u64;
            assert!(
                (expected * 9 / 10..=expected * 11 / 10).contains(&ms),
                "attempt {n}: {ms}ms outside jitter band of {expected}ms"
            );
        }
    }

    #[test]
    fn test_delay_capped() {
        let p = policy();
        assert_eq!(p.delay(10, "gantry-a"), Duration::from_millis(60_000));
        assert_eq!(p.delay(u32::MAX, "gantry-a"), Duration::from_millis(60_000));
    }

    #[test]
    fn test_jitter_is_deterministic_per_seed() {
        let p = policy();
        assert_eq!(p.delay(3, "gantry-a"), p.delay(3, "gantry-a"));
    }

    #[test]
    fn test_from_config() {
        let p = BackoffPolicy::from_config(&WorkerConfig {
            backoff_base_ms: 10,
            backoff_max_ms: 25,
            ..Default::default()
        });
        assert!(p.delay(1, "w").as_millis() <= 11);
        assert_eq!(p.delay(5, "w"), Duration::from_millis(25));
    }
}
