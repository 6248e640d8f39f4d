//! Sync execution - effectful operations
//!
//! Gathers live state, retires merged PRs, plans, then pushes and creates
//! PRs unit by unit.

use crate::config::Config;
use crate::error::Result;
use crate::git::VcsService;
use crate::platform::{HostService, enrich_units};
use crate::progress::ProgressCallback;
use crate::sync::plan::{SyncAction, SyncPlanEntry, SyncPlanOptions, plan_sync};
use crate::types::{EnrichedPrUnit, PrState, PrUnit, PullRequest};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Options for a sync run
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Planning options (publish flag, selection, default branch)
    pub plan: SyncPlanOptions,
    /// Compute and report the plan without mutating anything
    pub dry_run: bool,
}

/// A unit whose push or PR call failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    /// Unit id
    pub unit_id: String,
    /// Error message
    pub message: String,
}

/// Outcome of merged-PR retirement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Retirement {
    /// Head branches of merged units (deleted unless dry run)
    pub merged_branches: Vec<String>,
    /// Open PRs moved off a merged base
    pub retargeted: Vec<u64>,
}

/// Result of a sync run
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// The plan that was executed (or would be, on dry run)
    pub entries: Vec<SyncPlanEntry>,
    /// Merged-PR retirement
    pub retirement: Retirement,
    /// Branches pushed
    pub pushed: Vec<String>,
    /// PRs opened
    pub created: Vec<PullRequest>,
    /// PRs whose base was changed during update
    pub retargeted: Vec<u64>,
    /// Per-unit failures, in stack order
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    /// Whether every unit was processed without error
    pub const fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of entries that create or update a PR
    pub fn change_count(&self) -> usize {
        self.entries.iter().filter(|e| e.action.is_change()).count()
    }
}

/// Retire units whose PRs have been merged
///
/// Open PRs based on a merged unit's branch are moved to the default branch
/// first; only then are the merged branches deleted, since deleting a PR's
/// base makes the host close it. Retarget failures are ignored: the host may
/// already have moved or closed the PR. Successful retargets are reflected
/// in `units` so planning sees the new base.
pub async fn retire_merged(
    units: &mut [EnrichedPrUnit],
    host: &dyn HostService,
    vcs: &dyn VcsService,
    default_branch: &str,
    dry_run: bool,
    progress: &dyn ProgressCallback,
) -> Retirement {
    let mut retirement = Retirement {
        merged_branches: units
            .iter()
            .filter(|u| u.is_merged())
            .map(|u| u.head_branch.clone())
            .collect(),
        retargeted: Vec::new(),
    };
    if retirement.merged_branches.is_empty() {
        return retirement;
    }
    let merged: HashSet<String> = retirement.merged_branches.iter().cloned().collect();

    for unit in units.iter_mut().filter(|u| !u.is_merged()) {
        let Some(pr) = unit.pr.as_mut() else {
            continue;
        };
        if pr.state != PrState::Open || !merged.contains(&pr.base_ref) {
            continue;
        }

        progress
            .on_message(&format!(
                "Retargeting PR #{} from merged {} to {default_branch}",
                pr.number, pr.base_ref
            ))
            .await;
        if dry_run {
            retirement.retargeted.push(pr.number);
            continue;
        }
        match host.retarget_pr(pr.number, default_branch).await {
            Ok(()) => {
                pr.base_ref = default_branch.to_string();
                retirement.retargeted.push(pr.number);
            }
            Err(e) => debug!(pr_number = pr.number, error = %e, "ignoring retarget failure"),
        }
    }

    for branch in &retirement.merged_branches {
        progress
            .on_message(&format!("Deleting merged branch {branch}"))
            .await;
        if dry_run {
            continue;
        }
        if let Err(e) = vcs.delete_branch(branch).await {
            warn!(branch, error = %e, "failed to delete merged branch");
            progress
                .on_warning(&format!("Could not delete {branch}: {e}"))
                .await;
        }
    }

    retirement
}

/// Run a full sync of `units` against the host
///
/// Structural and lookup errors abort before anything is mutated. Once
/// execution starts, a failing unit is recorded in the report and the next
/// unit is still processed.
pub async fn run_sync(
    units: &[PrUnit],
    host: &dyn HostService,
    vcs: &dyn VcsService,
    config: &Config,
    options: &SyncOptions,
    progress: &dyn ProgressCallback,
) -> Result<SyncReport> {
    let default_branch = options.plan.default_branch.as_str();

    let mut enriched = enrich_units(host, units, &config.branch_prefix).await?;
    let retirement = retire_merged(
        &mut enriched,
        host,
        vcs,
        default_branch,
        options.dry_run,
        progress,
    )
    .await;

    let active: Vec<EnrichedPrUnit> = enriched.into_iter().filter(|u| !u.is_merged()).collect();
    let pattern = format!("{}/*", config.branch_prefix);
    let remote_tips = vcs.list_branches(&pattern).await?;

    let entries = plan_sync(&active, &remote_tips, config, &options.plan);
    info!(
        units = entries.len(),
        changes = entries.iter().filter(|e| e.action.is_change()).count(),
        "sync plan ready"
    );

    let mut report = SyncReport {
        entries,
        retirement,
        ..SyncReport::default()
    };
    if options.dry_run {
        return Ok(report);
    }

    let entries = report.entries.clone();
    for entry in &entries {
        if let Err(e) = execute_entry(entry, host, vcs, &mut report, progress).await {
            warn!(unit = %entry.unit_id, error = %e, "sync failed for unit");
            progress
                .on_warning(&format!("Failed to sync {}: {e}", entry.unit_id))
                .await;
            report.failures.push(SyncFailure {
                unit_id: entry.unit_id.clone(),
                message: e.to_string(),
            });
        }
    }

    Ok(report)
}

async fn execute_entry(
    entry: &SyncPlanEntry,
    host: &dyn HostService,
    vcs: &dyn VcsService,
    report: &mut SyncReport,
    progress: &dyn ProgressCallback,
) -> Result<()> {
    if entry.push {
        progress
            .on_message(&format!("Pushing {}", entry.head_branch))
            .await;
        vcs.push(&entry.head_commit, &entry.head_branch, true).await?;
        report.pushed.push(entry.head_branch.clone());
    }

    match entry.action {
        SyncAction::Create => {
            progress
                .on_message(&format!(
                    "Creating PR for {} (base: {})",
                    entry.head_branch, entry.base_branch
                ))
                .await;
            let pr = host
                .create_pr(&entry.title, &entry.head_branch, &entry.base_branch, None)
                .await?;
            progress
                .on_message(&format!("Created PR #{}: {}", pr.number, pr.html_url))
                .await;
            report.created.push(pr);
        }
        SyncAction::Update => {
            if let (true, Some(number)) = (entry.retarget, entry.existing_pr) {
                progress
                    .on_message(&format!("Retargeting PR #{number} to {}", entry.base_branch))
                    .await;
                host.retarget_pr(number, &entry.base_branch).await?;
                report.retargeted.push(number);
            }
        }
        SyncAction::InSync
        | SyncAction::SkipNoFlag
        | SyncAction::SkipTemp
        | SyncAction::SkipNotSelected => {}
    }

    Ok(())
}
