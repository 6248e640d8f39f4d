//! Error types for strata

use crate::types::short_hash;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Structural problems in the commit trailers of a stack
///
/// Both variants are terminal: the caller reports them and stops instead of
/// guessing which arrangement the user meant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    /// A group's commits are not contiguous
    #[error(
        "group '{group_id}' is split: commit(s) {} sit between its commits",
        format_hashes(.interrupting)
    )]
    SplitGroup {
        /// Group id
        group_id: String,
        /// Every commit hash carrying this group id, oldest first
        commit_hashes: Vec<String>,
        /// Hashes strictly between the two nearest non-contiguous runs
        interrupting: Vec<String>,
    },

    /// The same group id carries different titles on different commits
    #[error(
        "group '{group_id}' has conflicting titles: {}",
        format_titles(.titles)
    )]
    InconsistentGroupTitle {
        /// Group id
        group_id: String,
        /// Commit hash to the title it declares
        titles: BTreeMap<String, String>,
    },
}

fn format_hashes(hashes: &[String]) -> String {
    hashes
        .iter()
        .map(|h| short_hash(h))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_titles(titles: &BTreeMap<String, String>) -> String {
    titles
        .iter()
        .map(|(hash, title)| format!("{} \"{title}\"", short_hash(hash)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors that can occur in strata
#[derive(Debug, Error)]
pub enum Error {
    /// Structural stack validation failed
    #[error(transparent)]
    Stack(#[from] StackError),

    /// A git subprocess failed
    #[error("git error: {0}")]
    Git(String),

    /// GitHub API error
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    /// Generic host error (used by fakes and decorators)
    #[error("platform error: {0}")]
    Platform(String),

    /// Authentication error
    #[error("authentication error: {0}")]
    Auth(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// No remote with a recognizable GitHub URL
    #[error("no supported remotes found (only GitHub remotes are supported)")]
    NoSupportedRemotes,

    /// Named remote does not exist
    #[error("remote '{0}' not found")]
    RemoteNotFound(String),

    /// A unit selector matched nothing
    #[error("no unit matches '{0}'")]
    UnitNotFound(String),

    /// A unit selector matched more than one unit
    #[error("'{selector}' is ambiguous: matches {}", .candidates.join(", "))]
    AmbiguousSelector {
        /// What the user typed
        selector: String,
        /// Unit ids it matched
        candidates: Vec<String>,
    },

    /// PR readiness snapshot failed
    #[error("PR #{pr_number} is not ready to land: {}", .reasons.join("; "))]
    PrNotReady {
        /// PR number
        pr_number: u64,
        /// Human-readable reasons
        reasons: Vec<String>,
    },

    /// The fast-forward precondition does not hold
    #[error("PR #{pr_number} cannot be fast-forwarded: {reason}")]
    PrNotFastForward {
        /// PR number
        pr_number: u64,
        /// Why
        reason: String,
    },

    /// Host lookup for a PR failed
    #[error("PR #{0} not found")]
    PrNotFound(u64),

    /// The land push succeeded but the host never reported the PR as merged
    #[error("pushed PR #{pr_number} but it was not reported merged after {waited:?}")]
    MergeNotConfirmed {
        /// PR number
        pr_number: u64,
        /// How long we polled
        waited: Duration,
    },

    /// Retries exhausted while the host was rate limiting us
    #[error("rate limited by the host; try again in {}s", .retry_after.as_secs())]
    RateLimited {
        /// Suggested wait before trying again
        retry_after: Duration,
    },

    /// Some units failed during sync
    #[error("sync finished with {0} failed unit(s)")]
    SyncIncomplete(usize),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<octocrab::Error> for Error {
    fn from(err: octocrab::Error) -> Self {
        match err {
            octocrab::Error::GitHub { source, .. } => Self::GitHubApi(format!(
                "{} {}",
                source.status_code.as_u16(),
                source.message
            )),
            other => Self::GitHubApi(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let status = err
            .status()
            .map(|s| format!("{} ", s.as_u16()))
            .unwrap_or_default();
        Self::GitHubApi(format!("{status}{err}"))
    }
}

/// Result type alias for strata
pub type Result<T> = std::result::Result<T, Error>;
