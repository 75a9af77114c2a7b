use std::time::Duration;

use crate::config::RetryConfig;

/// Exponential backoff for reloading a profile that is not there yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(2000),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based), or `None` once the
    /// budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        Some(self.base_delay.saturating_mul(2u32.saturating_pow(attempt)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_for(1), Some(Duration::from_secs(4)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_secs(8)));
        assert_eq!(policy.delay_for(3), None);
    }

    #[test]
    fn test_from_config() {
        let policy = RetryPolicy::from(&RetryConfig {
            max_retries: 1,
            base_delay_ms: 10,
        });
        assert_eq!(policy.delay_for(0), Some(Duration::from_millis(10)));
        assert_eq!(policy.delay_for(1), None);
    }

    #[test]
    fn test_zero_budget() {
        let policy = RetryPolicy {
            max_retries: 0,
            base_delay: Duration::from_secs(1),
        };
        assert_eq!(policy.delay_for(0), None);
    }
}
