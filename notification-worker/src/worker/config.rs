use std::time::Duration;

use crate::types::environment::Environment;

/// Retry ceiling and fixed delay between failed attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total delivery attempts before a job is dropped
    pub max_attempts: u32,
    /// Delay before a failed job is put back on the queue
    pub retry_delay: Duration,
}

impl RetryPolicy {
    /// Whether a job with `attempt_count` failed attempts gets another try
    #[must_use]
    pub const fn should_retry(&self, attempt_count: u32) -> bool {
        attempt_count < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Configuration for the dispatch worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Sleep between polls when the queue is empty
    pub idle_interval: Duration,
    /// Retry policy for failed deliveries
    pub retry: RetryPolicy,
    /// Sleep after an unexpected fault in a dispatch cycle
    pub fault_cooldown: Duration,
    /// Delay before the first poll after start
    pub startup_delay: Duration,
}

impl WorkerConfig {
    /// Creates a new `WorkerConfig` from the given environment
    #[must_use]
    pub fn from_environment(env: &Environment) -> Self {
        Self {
            idle_interval: env.idle_interval(),
            retry: env.retry_policy(),
            fault_cooldown: env.fault_cooldown(),
            startup_delay: env.startup_delay(),
        }
    }

    /// Longest sleep the worker can be in, which bounds shutdown latency
    #[must_use]
    pub fn longest_sleep(&self) -> Duration {
        self.idle_interval
            .max(self.retry.retry_delay)
            .max(self.fault_cooldown)
            .max(self.startup_delay)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_secs(2),
            retry: RetryPolicy::default(),
            fault_cooldown: Duration::from_secs(5),
            startup_delay: Duration::from_secs(3),
        }
    }
}
