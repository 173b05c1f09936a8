//! Run configuration.
//!
//! A [`FolioConfig`] is loaded once by the composition root and passed
//! explicitly into the orchestrator and fetcher at construction. Every field
//! has a default, so a partial (or empty) configuration file is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{CoverageConfig, FolioError, RecoveryBudget, RetryStrategy};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolioConfig {
    /// Repair-loop budgets.
    pub recovery: RecoveryBudget,
    /// Retry policy for collaborator calls.
    pub retry: RetrySettings,
    /// Coverage tracker tuning.
    pub coverage: CoverageConfig,
    /// Secure fetcher limits.
    pub fetch: FetchSettings,
}

impl FolioConfig {
    /// Rejects values that would make a run misbehave.
    pub fn validate(&self) -> Result<(), FolioError> {
        let fail = |message: &str| {
            Err(FolioError::ConfigurationError {
                message: message.to_string(),
            })
        };
        if self.coverage.recurrence_threshold == 0 {
            return fail("coverage.recurrence_threshold must be at least 1");
        }
        if self.coverage.min_topic_chars > self.coverage.max_topic_chars {
            return fail("coverage.min_topic_chars must not exceed coverage.max_topic_chars");
        }
        if self.retry.multiplier == 0 {
            return fail("retry.multiplier must be at least 1");
        }
        if self.fetch.max_size_bytes == 0 {
            return fail("fetch.max_size_bytes must be positive");
        }
        if self.fetch.timeout_ms == 0 {
            return fail("fetch.timeout_ms must be positive");
        }
        if self.fetch.max_concurrent == 0 {
            return fail("fetch.max_concurrent must be at least 1");
        }
        Ok(())
    }
}

/// Serialisable form of a [`RetryStrategy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay after the first failure, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Growth factor per further failure.
    pub multiplier: u32,
    /// Cap on any single delay, in milliseconds.
    pub max_backoff_ms: u64,
}

impl RetrySettings {
    /// Converts to the executable strategy.
    pub fn to_strategy(&self) -> RetryStrategy {
        RetryStrategy {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            multiplier: self.multiplier,
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 500,
            multiplier: 2,
            max_backoff_ms: 30_000,
        }
    }
}

/// Default cap on a fetched asset (10 MiB).
pub const DEFAULT_MAX_ASSET_BYTES: u64 = 10 * 1024 * 1024;

/// Limits applied to every asset fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Largest accepted payload.
    pub max_size_bytes: u64,
    /// Whether to check the declared size before downloading.
    pub check_size_first: bool,
    /// Per-call total timeout, in milliseconds.
    pub timeout_ms: u64,
    /// Per-call connect timeout, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Retries for transient failures.
    pub retries: u32,
    /// Delay after the first transient failure, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Downloads allowed in flight at once during asset collection.
    pub max_concurrent: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_ASSET_BYTES,
            check_size_first: true,
            timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            retries: 3,
            initial_backoff_ms: 1_000,
            max_concurrent: 4,
        }
    }
}
