//! Reconnect retry policy.

use std::time::Duration;

/// Retry policy for session negotiation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Fixed interval between retries
    Fixed {
        /// Time interval between retry attempts
        interval: Duration,
        /// Maximum number of attempts, the first one included
        max_attempts: u32,
    },
    /// Exponential backoff
    Exponential {
        /// Base delay for exponential backoff calculation
        base: Duration,
        /// Maximum delay between retry attempts
        max_delay: Duration,
        /// Maximum number of attempts, the first one included
        max_attempts: u32,
    },
    /// Single attempt, never retry
    Never,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::Fixed {
            interval: Duration::from_secs(2),
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// Total number of attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::Fixed { max_attempts, .. } | Self::Exponential { max_attempts, .. } => {
                (*max_attempts).max(1)
            }
            Self::Never => 1,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (0-based), or
    /// `None` when no attempts remain.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt + 1 >= self.max_attempts() {
            return None;
        }
        match self {
            Self::Fixed { interval, .. } => Some(*interval),
            Self::Exponential {
                base, max_delay, ..
            } => {
                let base_delay = (base.as_millis() as u64).saturating_mul(2u64.saturating_pow(attempt));
                Some(Duration::from_millis(
                    base_delay.min(max_delay.as_millis() as u64),
                ))
            }
            Self::Never => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_fixed() {
        let policy = RetryPolicy::Fixed {
            interval: Duration::from_secs(2),
            max_attempts: 3,
        };

        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_after(0), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_after(2), None);
    }

    #[test]
    fn test_retry_policy_exponential() {
        let policy = RetryPolicy::Exponential {
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            max_attempts: 10,
        };

        assert_eq!(policy.delay_after(0), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_secs(4)));
        assert_eq!(policy.delay_after(3), Some(Duration::from_secs(5)));
        assert_eq!(policy.delay_after(9), None);
    }

    #[test]
    fn test_retry_policy_never() {
        assert_eq!(RetryPolicy::Never.max_attempts(), 1);
        assert_eq!(RetryPolicy::Never.delay_after(0), None);
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let policy = RetryPolicy::Fixed {
            interval: Duration::from_millis(10),
            max_attempts: 0,
        };
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.delay_after(0), None);
    }
}
