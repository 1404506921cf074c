//! Reconnect delay calculation for the event stream.

use std::time::Duration;

use rand::RngExt;

/// Delay policy between reconnect attempts.
///
/// With the defaults used by [`SseConfig`](crate::sse::SseConfig) the delay
/// is fixed; a `factor` above `1.0` grows it per attempt up to `max_delay`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct BackoffConfig {
    pub(crate) initial_delay: Duration,
    pub(crate) max_delay: Duration,
    pub(crate) factor: f64,
    pub(crate) jitter: f64,
}

impl BackoffConfig {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.initial_delay.is_zero() {
            return Err("Initial reconnect delay must be > 0".to_string());
        }
        if self.max_delay < self.initial_delay {
            return Err("Max reconnect delay must be >= initial reconnect delay".to_string());
        }
        if self.factor < 1.0 || !self.factor.is_finite() {
            return Err("Backoff factor must be >= 1.0".to_string());
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err("Jitter must be between 0.0 and 1.0".to_string());
        }
        Ok(())
    }
}

/// Delay before reconnect attempt number `attempt` (zero-based).
///
/// Never exceeds `max_delay`. Jitter only ever shortens the delay.
pub(crate) fn calculate_backoff(config: BackoffConfig, attempt: u32) -> Duration {
    let initial = config.initial_delay.as_secs_f64();
    let max = config.max_delay.as_secs_f64();
    let growth = config.factor.powf(f64::from(attempt));
    let base = (initial * growth).min(max);

    if config.jitter == 0.0 {
        return Duration::from_secs_f64(base);
    }

    let mut rng = rand::rng();
    let randomized = rng.random_range(0.0..=base);
    Duration::from_secs_f64(base * (1.0 - config.jitter) + randomized * config.jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(ms: u64) -> BackoffConfig {
        BackoffConfig {
            initial_delay: Duration::from_millis(ms),
            max_delay: Duration::from_millis(ms),
            factor: 1.0,
            jitter: 0.0,
        }
    }

    #[test]
    fn test_fixed_delay_does_not_grow() {
        let config = fixed(500);
        for attempt in [0, 1, 10, 1000, u32::MAX] {
            assert_eq!(calculate_backoff(config, attempt), Duration::from_millis(500));
        }
    }

    #[test]
    fn test_growth_is_capped() {
        let config = BackoffConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            factor: 2.0,
            jitter: 0.0,
        };
        assert_eq!(calculate_backoff(config, 0), Duration::from_millis(100));
        assert_eq!(calculate_backoff(config, 2), Duration::from_millis(400));
        assert_eq!(calculate_backoff(config, 10), Duration::from_secs(1));
        assert_eq!(calculate_backoff(config, u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let config = BackoffConfig {
            jitter: 0.5,
            ..fixed(1000)
        };
        for _ in 0..100 {
            let delay = calculate_backoff(config, 3);
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(1000));
        }
    }

    #[test]
    fn test_validate() {
        assert!(fixed(500).validate().is_ok());
        assert!(fixed(0).validate().is_err());
        assert!(
            BackoffConfig {
                factor: 0.5,
                ..fixed(500)
            }
            .validate()
            .is_err()
        );
        assert!(
            BackoffConfig {
                max_delay: Duration::from_millis(100),
                ..fixed(500)
            }
            .validate()
            .is_err()
        );
        assert!(
            BackoffConfig {
                jitter: 1.5,
                ..fixed(500)
            }
            .validate()
            .is_err()
        );
    }
}
