//! Configuration
//!
//! A single [`Config`] value is loaded once at startup and passed by
//! reference to every component. Nothing re-reads it behind the caller's back.

mod storage;

pub use storage::{config_path, load_config, resolve_git_dir, user_config_path};

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote to push branches to and read PRs from
    pub remote: String,
    /// Default branch override (detected from the remote when unset)
    pub default_branch: Option<String>,
    /// Prefix for unit head branches (`<prefix>/<unit id>`)
    pub branch_prefix: String,
    /// Title prefixes marking temporary commits (case-insensitive)
    pub temp_prefixes: Vec<String>,
    /// Remote API retry settings
    pub retry: RetryConfig,
    /// Land protocol settings
    pub land: LandConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            default_branch: None,
            branch_prefix: "strata".to_string(),
            temp_prefixes: vec![
                "WIP".to_string(),
                "fixup!".to_string(),
                "squash!".to_string(),
                "amend!".to_string(),
            ],
            retry: RetryConfig::default(),
            land: LandConfig::default(),
        }
    }
}

impl Config {
    /// Whether a unit title marks a temporary commit
    ///
    /// Matching is case-insensitive. A prefix ending in a letter or digit
    /// must end at a word boundary, so `WIP` matches "wip: x" but not "Wipe".
    pub fn is_temp_title(&self, title: &str) -> bool {
        let title = title.trim_start().to_lowercase();
        self.temp_prefixes.iter().any(|prefix| {
            let prefix = prefix.to_lowercase();
            let Some(rest) = title.strip_prefix(&prefix) else {
                return false;
            };
            !prefix.ends_with(char::is_alphanumeric)
                || !rest.starts_with(char::is_alphanumeric)
        })
    }
}

/// Retry/concurrency settings for host API calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per call (including the first)
    pub max_attempts: u32,
    /// Backoff base in milliseconds
    pub base_delay_ms: u64,
    /// Backoff cap in milliseconds
    pub max_delay_ms: u64,
    /// Jitter factor in `[0, 1]`
    pub jitter: f64,
    /// Maximum concurrent host API calls
    pub concurrency: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            jitter: 0.5,
            concurrency: 5,
        }
    }
}

impl RetryConfig {
    /// Convert to the policy the retry layer runs with
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: self.jitter.clamp(0.0, 1.0),
        }
    }
}

/// Land protocol settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandConfig {
    /// How often to poll the host for the merged state, in milliseconds
    pub poll_interval_ms: u64,
    /// How long to poll before giving up, in milliseconds
    pub poll_timeout_ms: u64,
}

impl Default for LandConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            poll_timeout_ms: 30_000,
        }
    }
}

impl LandConfig {
    /// Poll interval as a duration
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Poll timeout as a duration
    pub const fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}
