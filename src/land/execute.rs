//! Land execution - the sequential walk and deferred cleanup

use crate::error::{Error, Result};
use crate::git::VcsService;
use crate::land::snapshot::{LandCandidate, capture_snapshots, land_candidates};
use crate::platform::HostService;
use crate::progress::ProgressCallback;
use crate::types::{EnrichedPrUnit, MergeSnapshot, PrState, short_hash};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How far up the stack to land
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LandMode {
    /// Only the bottom-most open PR
    #[default]
    Single,
    /// Every consecutive ready PR from the bottom
    AllConsecutive,
}

/// Options for a land run
#[derive(Debug, Clone)]
pub struct LandOptions {
    /// Single or all-consecutive
    pub mode: LandMode,
    /// Branch PRs land onto
    pub default_branch: String,
    /// Interval between merged-state polls
    pub poll_interval: Duration,
    /// Give up polling after this long
    pub poll_timeout: Duration,
}

/// A PR that landed during this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandedPr {
    /// Unit id
    pub unit_id: String,
    /// PR number
    pub pr_number: u64,
    /// Commit the default branch now points at
    pub head_commit: String,
}

/// Where an all-consecutive walk stopped because a PR was not ready
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoppedAt {
    /// Unit id
    pub unit_id: String,
    /// PR number
    pub pr_number: u64,
    /// Why it was not ready
    pub reasons: Vec<String>,
}

/// Result of a land run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LandReport {
    /// PRs landed, bottom-up
    pub landed: Vec<LandedPr>,
    /// First not-ready PR, if the walk stopped early
    pub stopped_at: Option<StoppedAt>,
    /// Head branches deleted during cleanup
    pub deleted_branches: Vec<String>,
    /// Head branches whose deletion failed
    pub failed_deletions: Vec<String>,
}

impl LandReport {
    /// Whether anything landed
    pub const fn has_landed(&self) -> bool {
        !self.landed.is_empty()
    }
}

/// Land the stack bottom-up (EFFECTFUL)
///
/// Readiness comes from snapshots taken before anything is mutated. A PR
/// that is not ready stops the walk; if it is the first candidate that is an
/// error, otherwise the run ends normally with [`LandReport::stopped_at`]
/// set. Branches of landed PRs are deleted only after the walk ends, and
/// still are when the walk ends in an error.
pub async fn land_stack(
    units: &[EnrichedPrUnit],
    host: &dyn HostService,
    vcs: &dyn VcsService,
    options: &LandOptions,
    progress: &dyn ProgressCallback,
) -> Result<LandReport> {
    let candidates = land_candidates(units);
    let mut report = LandReport::default();
    if candidates.is_empty() {
        progress.on_message("No open PRs to land").await;
        return Ok(report);
    }

    progress
        .on_message(&format!(
            "Checking readiness of {} PR(s)",
            candidates.len()
        ))
        .await;
    let snapshots = capture_snapshots(host, &candidates).await?;

    let mut pending_deletions = Vec::new();
    let walk = walk(
        &candidates,
        &snapshots,
        host,
        vcs,
        options,
        progress,
        &mut report,
        &mut pending_deletions,
    )
    .await;

    cleanup(&pending_deletions, vcs, progress, &mut report).await;

    walk.map(|()| report)
}

#[allow(clippy::too_many_arguments)]
async fn walk(
    candidates: &[LandCandidate],
    snapshots: &HashMap<u64, MergeSnapshot>,
    host: &dyn HostService,
    vcs: &dyn VcsService,
    options: &LandOptions,
    progress: &dyn ProgressCallback,
    report: &mut LandReport,
    pending_deletions: &mut Vec<String>,
) -> Result<()> {
    let limit = match options.mode {
        LandMode::Single => 1,
        LandMode::AllConsecutive => candidates.len(),
    };

    for (index, candidate) in candidates.iter().enumerate().take(limit) {
        let number = candidate.pr.number;
        let snapshot = snapshots.get(&number).ok_or(Error::PrNotFound(number))?;

        if !snapshot.is_ready {
            let reasons = snapshot.blocking_reasons();
            if index == 0 {
                return Err(Error::PrNotReady {
                    pr_number: number,
                    reasons,
                });
            }
            info!(pr_number = number, "stopping land walk at unready PR");
            progress
                .on_message(&format!(
                    "Stopping at PR #{number}: {}",
                    reasons.join(", ")
                ))
                .await;
            report.stopped_at = Some(StoppedAt {
                unit_id: candidate.unit_id.clone(),
                pr_number: number,
                reasons,
            });
            break;
        }

        if report.has_landed() {
            // Its base was the previous (landed) unit's branch
            retarget_to_default(host, number, &options.default_branch, progress).await?;
        } else {
            ensure_based_on_default(host, number, &options.default_branch).await?;
        }
        // Must happen before this unit's branch can be deleted
        if let Some(next) = candidates.get(index + 1) {
            retarget_to_default(host, next.pr.number, &options.default_branch, progress).await?;
        }

        progress
            .on_message(&format!("Landing PR #{number}: {}", candidate.pr.title))
            .await;
        let head_commit = fast_forward(candidate, vcs, &options.default_branch).await?;
        wait_for_merged(host, number, options).await?;

        progress
            .on_message(&format!(
                "Landed PR #{number} at {}",
                short_hash(&head_commit)
            ))
            .await;
        report.landed.push(LandedPr {
            unit_id: candidate.unit_id.clone(),
            pr_number: number,
            head_commit,
        });
        pending_deletions.push(candidate.head_branch.clone());
    }

    Ok(())
}

/// Move a PR onto the default branch unless its live base already is
async fn retarget_to_default(
    host: &dyn HostService,
    pr_number: u64,
    default_branch: &str,
    progress: &dyn ProgressCallback,
) -> Result<()> {
    let base = host.get_base_branch(pr_number).await?;
    if base == default_branch {
        debug!(pr_number, "already based on default branch");
        return Ok(());
    }

    progress
        .on_message(&format!(
            "Retargeting PR #{pr_number} from {base} to {default_branch}"
        ))
        .await;
    host.retarget_pr(pr_number, default_branch).await
}

/// Refuse to land a PR that sits on top of another unit's branch
///
/// With nothing landed yet, a base other than the default branch means the
/// unit below has no open PR (e.g. it was closed). Fast-forwarding would put
/// that unit's commits on the default branch unreviewed.
async fn ensure_based_on_default(
    host: &dyn HostService,
    pr_number: u64,
    default_branch: &str,
) -> Result<()> {
    let base = host.get_base_branch(pr_number).await?;
    if base == default_branch {
        return Ok(());
    }
    Err(Error::PrNotFastForward {
        pr_number,
        reason: format!(
            "it is based on {base}, not {default_branch}; land or drop the commits below it first"
        ),
    })
}

/// Push the PR's head commit onto the default branch, refusing non-fast-forwards
async fn fast_forward(
    candidate: &LandCandidate,
    vcs: &dyn VcsService,
    default_branch: &str,
) -> Result<String> {
    let number = candidate.pr.number;
    let head_commit = vcs
        .get_head_commit(&candidate.head_branch)
        .await
        .ok_or(Error::PrNotFound(number))?;

    vcs.fetch().await?;
    let target = vcs
        .get_head_commit(default_branch)
        .await
        .ok_or_else(|| Error::PrNotFastForward {
            pr_number: number,
            reason: format!("{default_branch} does not exist on the remote"),
        })?;

    if !vcs.is_ancestor(&target, &head_commit).await {
        return Err(Error::PrNotFastForward {
            pr_number: number,
            reason: format!(
                "{default_branch} ({}) is not an ancestor of {} ({}); rebase the stack first",
                short_hash(&target),
                candidate.head_branch,
                short_hash(&head_commit)
            ),
        });
    }

    info!(pr_number = number, commit = %head_commit, "fast-forwarding {default_branch}");
    vcs.push(&head_commit, default_branch, false).await?;
    Ok(head_commit)
}

/// Poll until the host reports the PR merged
async fn wait_for_merged(host: &dyn HostService, pr_number: u64, options: &LandOptions) -> Result<()> {
    let started = Instant::now();
    loop {
        let state = host.get_state(pr_number).await?;
        if state == PrState::Merged {
            debug!(pr_number, waited = ?started.elapsed(), "host reports merged");
            return Ok(());
        }

        let waited = started.elapsed();
        if waited >= options.poll_timeout {
            return Err(Error::MergeNotConfirmed { pr_number, waited });
        }
        debug!(pr_number, %state, "waiting for host to report merged");
        tokio::time::sleep(options.poll_interval).await;
    }
}

async fn cleanup(
    branches: &[String],
    vcs: &dyn VcsService,
    progress: &dyn ProgressCallback,
    report: &mut LandReport,
) {
    for branch in branches {
        match vcs.delete_branch(branch).await {
            Ok(()) => {
                progress.on_message(&format!("Deleted {branch}")).await;
                report.deleted_branches.push(branch.clone());
            }
            Err(e) => {
                warn!(branch, error = %e, "failed to delete landed branch");
                progress
                    .on_warning(&format!("Could not delete {branch}: {e}"))
                    .await;
                report.failed_deletions.push(branch.clone());
            }
        }
    }
}
