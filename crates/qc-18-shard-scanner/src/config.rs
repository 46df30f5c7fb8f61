//! # Shard Scanner Configuration
//!
//! Configuration for the Shard Scanner service.

use crate::domain::{
    ScanError, ShardKey, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_WALK_BLOCKS, DEFAULT_PAGE_SIZE,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for a master iteration that failed with a retryable error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per master iteration (first try included).
    pub max_attempts: u32,
    /// Delay before the first replay, in milliseconds.
    pub base_delay_ms: u64,
    /// Cap on the backoff delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Fail on the first error (the reference scanner behaviour).
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

/// Shard scanner configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Master chain lane to walk.
    pub master: ShardKey,

    /// Transaction ids requested per page.
    pub page_size: u32,

    /// Transactions resolved concurrently within one page (order is kept).
    pub resolve_concurrency: usize,

    /// Upper bound on blocks one ancestor walk may visit.
    pub max_walk_blocks: usize,

    /// Skip blocks already emitted earlier in the same master iteration.
    pub dedup_within_iteration: bool,

    /// Deadline for a single provider call, in milliseconds.
    pub call_timeout_ms: u64,

    /// Retry/backoff policy.
    pub retry: RetryPolicy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            master: ShardKey::masterchain(),
            page_size: DEFAULT_PAGE_SIZE,
            resolve_concurrency: 1,
            max_walk_blocks: DEFAULT_MAX_WALK_BLOCKS,
            dedup_within_iteration: true,
            call_timeout_ms: 30_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl ScanConfig {
    /// Create a config for testing (no backoff delay).
    pub fn for_testing() -> Self {
        Self {
            max_walk_blocks: 1_000,
            call_timeout_ms: 5_000,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 0,
                max_delay_ms: 0,
            },
            ..Self::default()
        }
    }

    /// Override the page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Per-call deadline.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Reject values the scanner cannot run with.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.page_size == 0 {
            return Err(ScanError::InvalidConfig("page_size must be > 0".into()));
        }
        if self.resolve_concurrency == 0 {
            return Err(ScanError::InvalidConfig(
                "resolve_concurrency must be > 0".into(),
            ));
        }
        if self.max_walk_blocks == 0 {
            return Err(ScanError::InvalidConfig(
                "max_walk_blocks must be > 0".into(),
            ));
        }
        if self.call_timeout_ms == 0 {
            return Err(ScanError::InvalidConfig(
                "call_timeout_ms must be > 0".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ScanError::InvalidConfig(
                "retry.max_attempts must be > 0".into(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ScanError::InvalidConfig(
                "retry.base_delay_ms exceeds retry.max_delay_ms".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScanConfig::default();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.master, ShardKey::masterchain());
        assert!(config.dedup_within_iteration);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_testing_config() {
        let config = ScanConfig::for_testing();
        assert_eq!(config.retry.base_delay_ms, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let config = ScanConfig::default().with_page_size(0);
        assert!(matches!(
            config.validate(),
            Err(ScanError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_backoff() {
        let mut config = ScanConfig::default();
        config.retry.base_delay_ms = 10;
        config.retry.max_delay_ms = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_call_timeout() {
        let mut config = ScanConfig::default();
        config.call_timeout_ms = 0;
        assert!(config.validate().is_err());
        assert_eq!(
            ScanConfig::default().call_timeout(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_config_json_roundtrip() {
        let json = serde_json::to_string(&ScanConfig::default()).unwrap();
        let parsed: ScanConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ScanConfig::default());
    }
}
