//! Sync planning - pure functions deciding what each unit needs
//!
//! No I/O happens here. The caller gathers PR and branch state first; this
//! module only diffs it against the local stack.

use crate::config::Config;
use crate::types::EnrichedPrUnit;
use std::collections::{HashMap, HashSet};
use std::hash::BuildHasher;

/// What sync will do for one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Open a new PR
    Create,
    /// Bring an existing PR up to date (push and/or retarget)
    Update,
    /// Branch and PR already match the local stack
    InSync,
    /// No PR exists and PR creation was not requested
    SkipNoFlag,
    /// No PR is opened for temporary commits
    SkipTemp,
    /// Unit is outside the caller's selection
    SkipNotSelected,
}

impl SyncAction {
    /// Whether this action changes the host's PR set or content
    pub const fn is_change(self) -> bool {
        matches!(self, Self::Create | Self::Update)
    }
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::InSync => write!(f, "in sync"),
            Self::SkipNoFlag => write!(f, "skip (no --publish)"),
            Self::SkipTemp => write!(f, "skip (temporary)"),
            Self::SkipNotSelected => write!(f, "skip (not selected)"),
        }
    }
}

/// One planned unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlanEntry {
    /// Unit id
    pub unit_id: String,
    /// PR title to use when creating
    pub title: String,
    /// Planned action
    pub action: SyncAction,
    /// Base branch: the previous unit's head branch, or the default branch
    pub base_branch: String,
    /// This unit's head branch
    pub head_branch: String,
    /// Commit the head branch must point at
    pub head_commit: String,
    /// Whether the head branch gets pushed
    pub push: bool,
    /// Open PR for the head branch, if any
    pub existing_pr: Option<u64>,
    /// Whether the existing PR's base must change
    pub retarget: bool,
}

impl std::fmt::Display for SyncPlanEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} -> {}", self.action, self.head_branch, self.base_branch)?;
        if let Some(number) = self.existing_pr {
            write!(f, " (PR #{number})")?;
        }
        if self.push {
            write!(f, " [push]")?;
        }
        if self.retarget {
            write!(f, " [retarget]")?;
        }
        Ok(())
    }
}

/// Inputs to planning that come from the command line
#[derive(Debug, Clone, Default)]
pub struct SyncPlanOptions {
    /// Open PRs for units that have none
    pub publish: bool,
    /// Only these unit ids may get new PRs (`None` = all)
    pub selected: Option<HashSet<String>>,
    /// Branch the bottom unit is based on
    pub default_branch: String,
}

/// Compute the per-unit sync plan
///
/// `units` must be the active (not merged) units in stack order; `remote_tips`
/// maps remote branch names to their current tip. Bases are chained from the
/// order of `units` on every call.
pub fn plan_sync<S: BuildHasher>(
    units: &[EnrichedPrUnit],
    remote_tips: &HashMap<String, String, S>,
    config: &Config,
    options: &SyncPlanOptions,
) -> Vec<SyncPlanEntry> {
    let mut base_branch = options.default_branch.clone();
    let mut entries = Vec::with_capacity(units.len());

    for enriched in units {
        let unit = &enriched.unit;
        let head_commit = unit.head_hash().to_string();
        let tip_differs = remote_tips.get(&enriched.head_branch) != Some(&head_commit);
        let open_pr = enriched.open_pr();
        let retarget = open_pr.is_some_and(|pr| pr.base_ref != base_branch);

        let (action, push) = match open_pr {
            Some(_) if tip_differs || retarget => (SyncAction::Update, tip_differs),
            Some(_) => (SyncAction::InSync, false),
            None if !options.publish => (SyncAction::SkipNoFlag, false),
            None => (downgrade_create(enriched, config, options), tip_differs),
        };

        entries.push(SyncPlanEntry {
            unit_id: unit.id.clone(),
            title: unit.display_title().to_string(),
            action,
            base_branch: base_branch.clone(),
            head_branch: enriched.head_branch.clone(),
            head_commit,
            push,
            existing_pr: open_pr.map(|pr| pr.number),
            retarget,
        });

        base_branch.clone_from(&enriched.head_branch);
    }

    entries
}

/// Downgrade a `Create` for temporary or unselected units
fn downgrade_create(enriched: &EnrichedPrUnit, config: &Config, options: &SyncPlanOptions) -> SyncAction {
    if config.is_temp_title(enriched.unit.display_title()) {
        return SyncAction::SkipTemp;
    }
    if let Some(selected) = &options.selected
        && !selected.contains(&enriched.unit.id)
    {
        return SyncAction::SkipNotSelected;
    }
    SyncAction::Create
}
