//! Core types for strata

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A local commit in the stack, as read from `git log`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Full commit hash (hex)
    pub hash: String,
    /// First line of the commit message
    pub subject: String,
    /// Commit message body (everything after the subject)
    pub body: String,
    /// Parsed `Key: value` trailers
    pub trailers: HashMap<String, String>,
}

impl Commit {
    /// Look up a trailer value, treating blank values as absent
    pub fn trailer(&self, key: &str) -> Option<&str> {
        self.trailers
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Abbreviate a commit hash to eight characters
pub fn short_hash(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}

/// Whether a unit is a single commit or a trailer-declared group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    /// One commit, one PR
    Single,
    /// Several contiguous commits sharing a group trailer, one PR
    Group,
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Group => write!(f, "group"),
        }
    }
}

/// One or more contiguous commits represented by exactly one pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrUnit {
    /// Single or group
    pub kind: UnitKind,
    /// Group id for groups; commit id (or hash prefix) for singles
    pub id: String,
    /// Human-readable title, if one is known
    pub title: Option<String>,
    /// Commit-identifier trailers of member commits that carry one (oldest first)
    pub commit_ids: Vec<String>,
    /// Member commit hashes (oldest first, never empty)
    pub commit_hashes: Vec<String>,
}

impl PrUnit {
    /// The newest commit of the unit; this is what the head branch points at
    pub fn head_hash(&self) -> &str {
        self.commit_hashes.last().map_or("", String::as_str)
    }

    /// Whether some member commit lacks a commit-identifier trailer
    pub fn needs_commit_ids(&self) -> bool {
        self.commit_ids.len() < self.commit_hashes.len()
    }

    /// Title to show users and to open PRs with
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }

    /// Remote branch that carries this unit
    pub fn head_branch(&self, prefix: &str) -> String {
        format!("{prefix}/{}", self.id)
    }
}

/// A unit joined with whatever PR the host reports for its head branch
#[derive(Debug, Clone)]
pub struct EnrichedPrUnit {
    /// The local unit
    pub unit: PrUnit,
    /// Head branch name on the remote
    pub head_branch: String,
    /// The PR for the head branch, if any
    pub pr: Option<PullRequest>,
}

impl EnrichedPrUnit {
    /// The PR, if it is still open
    pub fn open_pr(&self) -> Option<&PullRequest> {
        self.pr.as_ref().filter(|pr| pr.state == PrState::Open)
    }

    /// Whether the unit's PR has been merged
    pub fn is_merged(&self) -> bool {
        self.pr.as_ref().is_some_and(|pr| pr.state == PrState::Merged)
    }
}

/// A pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR number
    pub number: u64,
    /// Web URL for the PR
    pub html_url: String,
    /// Base branch name
    pub base_ref: String,
    /// Head branch name
    pub head_ref: String,
    /// PR title
    pub title: String,
    /// Current state
    pub state: PrState,
}

/// PR state (open, closed, merged)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrState {
    /// PR is open
    Open,
    /// PR was closed without merging
    Closed,
    /// PR was merged
    Merged,
}

impl std::fmt::Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Merged => write!(f, "merged"),
        }
    }
}

/// Aggregate CI status of a PR's head commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChecksStatus {
    /// At least one check is still running
    Pending,
    /// Every check passed (or none are configured)
    Passing,
    /// At least one check failed
    Failing,
}

/// Review decision reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewDecision {
    /// Approved by required reviewers
    Approved,
    /// A reviewer requested changes
    ChangesRequested,
    /// Review is required but not given yet
    ReviewRequired,
    /// The repository does not require review
    None,
}

/// Live merge status of a PR, as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeStatus {
    /// CI status
    pub checks: ChecksStatus,
    /// Review status
    pub review_decision: ReviewDecision,
}

/// Readiness of one PR, captured once before the land protocol mutates anything
///
/// This is the sole authority for "was this PR ready when the land command
/// started"; state changes made during the run never feed back into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSnapshot {
    /// PR number
    pub pr_number: u64,
    /// CI status at capture time
    pub checks_status: ChecksStatus,
    /// Review status at capture time
    pub review_decision: ReviewDecision,
    /// Whether the PR may be landed
    pub is_ready: bool,
}

impl MergeSnapshot {
    /// Build a snapshot from a live status reading
    pub fn capture(pr_number: u64, status: MergeStatus) -> Self {
        let is_ready = status.checks == ChecksStatus::Passing
            && matches!(
                status.review_decision,
                ReviewDecision::Approved | ReviewDecision::None
            );
        Self {
            pr_number,
            checks_status: status.checks,
            review_decision: status.review_decision,
            is_ready,
        }
    }

    /// Human-readable reasons why the PR is not ready (empty when ready)
    pub fn blocking_reasons(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        match self.checks_status {
            ChecksStatus::Passing => {}
            ChecksStatus::Pending => reasons.push("checks are still running".to_string()),
            ChecksStatus::Failing => reasons.push("checks are failing".to_string()),
        }
        match self.review_decision {
            ReviewDecision::Approved | ReviewDecision::None => {}
            ReviewDecision::ChangesRequested => reasons.push("changes requested".to_string()),
            ReviewDecision::ReviewRequired => reasons.push("review required".to_string()),
        }
        reasons
    }
}

/// Repository coordinates on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Custom host (None for github.com)
    pub host: Option<String>,
}
