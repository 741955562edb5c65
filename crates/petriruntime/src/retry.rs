use std::time::Duration;

/// Configuration for action retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the first (0 = no retries).
    pub max_retries: u32,
    /// Wall-clock timeout per attempt.
    pub timeout: Duration,
    /// Delay before a scheduled retry becomes runnable.
    pub retry_delay: Duration,
    /// Retry when the invoker returns an error result.
    pub retry_on_error: bool,
    /// Retry when the invoker returns a failure result.
    pub retry_on_failure: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_secs(30),
            retry_delay: Duration::from_secs(1),
            retry_on_error: true,
            retry_on_failure: false,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            retry_delay: Duration::ZERO,
            retry_on_error: false,
            retry_on_failure: false,
            ..Default::default()
        }
    }

    /// Policy that retries errors immediately, without delay.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            retry_delay: Duration::ZERO,
            ..Default::default()
        }
    }
}
