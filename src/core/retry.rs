//! Retry budget and backoff curve for optimistic commits
//!
//! The delay slept after failed attempt `n` (1-based) is
//! `min(initial_delay * multiplier^(n - 1), max_delay)`. No delay follows the
//! last attempt.

use std::time::Duration;

/// Bounded exponential backoff
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Growth factor applied per further failure
    pub multiplier: u32,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            initial_delay: Duration::from_millis(100),
            multiplier: 2,
            max_delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    /// Create a RetryPolicy with custom values
    ///
    /// Zero `max_attempts` or `multiplier` fall back to the defaults with a
    /// warning. A `max_delay` below `initial_delay` is raised to it.
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        multiplier: u32,
        max_delay: Duration,
    ) -> Self {
        let default = Self::default();

        let max_attempts = if max_attempts == 0 {
            tracing::warn!(
                "Invalid max_attempts ({}), using default ({})",
                max_attempts,
                default.max_attempts
            );
            default.max_attempts
        } else {
            max_attempts
        };

        let multiplier = if multiplier == 0 {
            tracing::warn!(
                "Invalid multiplier ({}), using default ({})",
                multiplier,
                default.multiplier
            );
            default.multiplier
        } else {
            multiplier
        };

        Self {
            max_attempts,
            initial_delay,
            multiplier,
            max_delay: max_delay.max(initial_delay),
        }
    }

    /// Policy that retries immediately, for tests and benches
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, 1, Duration::ZERO)
    }

    /// Delay to sleep after failed attempt `attempt` (1-based)
    ///
    /// Returns `None` once the budget is spent.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }
        let factor = self
            .multiplier
            .checked_pow(attempt - 1)
            .unwrap_or(u32::MAX);
        let delay = self
            .initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay);
        Some(delay.min(self.max_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::first(1, Some(100))]
    #[case::second(2, Some(200))]
    #[case::third(3, Some(400))]
    #[case::fifth(5, Some(1600))]
    #[case::capped(6, Some(2000))]
    #[case::still_capped(14, Some(2000))]
    #[case::budget_spent(15, None)]
    #[case::never_attempted(0, None)]
    fn test_default_backoff_curve(#[case] attempt: u32, #[case] expected_ms: Option<u64>) {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(attempt), expected_ms.map(Duration::from_millis));
    }

    #[test]
    fn test_total_default_backoff() {
        let policy = RetryPolicy::default();
        let total: Duration = (1..policy.max_attempts).filter_map(|n| policy.delay_after(n)).sum();
        // 100 + 200 + 400 + 800 + 1600 + 9 * 2000
        assert_eq!(total, Duration::from_millis(21_100));
    }

    #[test]
    fn test_zero_values_fall_back_to_defaults() {
        let policy = RetryPolicy::new(0, Duration::from_millis(5), 0, Duration::from_millis(1));
        assert_eq!(policy.max_attempts, 15);
        assert_eq!(policy.multiplier, 2);
        assert_eq!(policy.max_delay, Duration::from_millis(5));
    }

    #[test]
    fn test_huge_exponent_saturates_at_cap() {
        let policy = RetryPolicy::new(100, Duration::from_millis(100), 10, Duration::from_secs(3));
        assert_eq!(policy.delay_after(50), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_immediate_policy() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(policy.delay_after(1), Some(Duration::ZERO));
        assert_eq!(policy.delay_after(2), Some(Duration::ZERO));
        assert_eq!(policy.delay_after(3), None);
    }
}
