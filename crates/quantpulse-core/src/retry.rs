//! Per-provider retry policy.

use std::time::Duration;

use crate::data_source::ProviderError;

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// How often and how patiently a single provider is retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub enabled: bool,
    /// Retries after the first request. Total requests = `max_retries + 1`.
    pub max_retries: u32,
    /// Fixed pause between a request and its retry.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RETRY_DELAY, 1)
    }
}

impl RetryPolicy {
    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            enabled: true,
            max_retries,
            delay,
        }
    }

    pub fn no_retry() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Requests a provider may receive for one lookup.
    pub const fn attempts_per_provider(&self) -> u32 {
        if self.enabled {
            self.max_retries.saturating_add(1)
        } else {
            1
        }
    }

    /// Whether `error` on retry number `attempt` (0-based) earns another request.
    pub fn should_retry(&self, error: &ProviderError, attempt: u32) -> bool {
        self.enabled && attempt < self.max_retries && error.retryable()
    }

    pub fn delay_for_attempt(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_retries_transient_failures_once() {
        let policy = RetryPolicy::default();
        let transient = ProviderError::transient("503");

        assert_eq!(policy.attempts_per_provider(), 2);
        assert!(policy.should_retry(&transient, 0));
        assert!(!policy.should_retry(&transient, 1));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(200));
    }

    #[test]
    fn permanent_failures_are_not_retried() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_retry(&ProviderError::permanent("404"), 0));
    }

    #[test]
    fn disabled_policy_never_retries() {
        let policy = RetryPolicy::no_retry();
        assert_eq!(policy.attempts_per_provider(), 1);
        assert!(!policy.should_retry(&ProviderError::transient("timeout"), 0));
    }

    #[test]
    fn fixed_policy_uses_the_same_delay_for_every_retry() {
        let policy = RetryPolicy::fixed(Duration::from_millis(50), 2);
        assert_eq!(policy.attempts_per_provider(), 3);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(50));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(50));
    }
}
