pub mod poll;
pub mod push;

use std::time::Duration;

use rand::Rng;

pub use poll::PollingChannel;
pub use push::PushChannel;

/// Exponential backoff with jitter between reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay before the given attempt (1-based): `base * 2^(attempt-1)`,
    /// capped at `max`, plus up to half of `base` of jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base.as_millis() as f64;
        let max = self.max.as_millis() as f64;
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let capped = (base * 2_f64.powi(exponent)).min(max);

        let jitter_ms = (self.base.as_millis() / 2) as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };

        Duration::from_millis(capped as u64 + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_exponentially() {
        let policy = ReconnectPolicy::new(Duration::from_millis(100), Duration::from_secs(60));

        let first = policy.delay(1);
        let third = policy.delay(3);

        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(150));
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(450));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = ReconnectPolicy::new(Duration::from_millis(100), Duration::from_secs(1));

        let delay = policy.delay(50);

        assert!(delay >= Duration::from_secs(1));
        assert!(delay <= Duration::from_millis(1050));
    }

    #[test]
    fn test_zero_base_has_no_jitter() {
        let policy = ReconnectPolicy::new(Duration::ZERO, Duration::from_secs(1));
        assert_eq!(policy.delay(4), Duration::ZERO);
    }
}
