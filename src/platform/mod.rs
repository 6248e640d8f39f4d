//! Host services for pull request operations
//!
//! The sync reconciler and land protocol only ever see [`HostService`]; the
//! GitHub implementation and the retrying decorator both live behind it.

mod detection;
mod github;
mod retrying;

pub use detection::parse_repo_info;
pub use github::GitHubService;
pub use retrying::RetryingHost;

use crate::error::Result;
use crate::types::{EnrichedPrUnit, MergeStatus, PlatformConfig, PrState, PrUnit, PullRequest};
use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::HashMap;

/// Host service trait for PR operations
///
/// Every method is a single remote round trip (or a small fixed number of
/// them) so the retry layer can wrap each one independently.
#[async_trait]
pub trait HostService: Send + Sync {
    /// Find the most recent PR (any state) whose head is `branch`
    async fn find_pr_by_branch(&self, branch: &str) -> Result<Option<PullRequest>>;

    /// Open a PR from `head` into `base`
    async fn create_pr(
        &self,
        title: &str,
        head: &str,
        base: &str,
        body: Option<&str>,
    ) -> Result<PullRequest>;

    /// Read CI and review status for a PR
    async fn get_merge_status(&self, pr_number: u64) -> Result<MergeStatus>;

    /// Read the live base branch of a PR
    async fn get_base_branch(&self, pr_number: u64) -> Result<String>;

    /// Change the base branch of a PR
    async fn retarget_pr(&self, pr_number: u64, new_base: &str) -> Result<()>;

    /// Read the live state of a PR
    async fn get_state(&self, pr_number: u64) -> Result<PrState>;

    /// Get the repository coordinates
    fn config(&self) -> &PlatformConfig;
}

/// Resolve every branch to its PR with one concurrent fan-out
///
/// The result map is only returned once every lookup has settled; the first
/// failure fails the whole batch.
pub async fn find_prs_for_branches(
    host: &dyn HostService,
    branches: &[String],
) -> Result<HashMap<String, Option<PullRequest>>> {
    let lookups = branches.iter().map(|branch| async move {
        let pr = host.find_pr_by_branch(branch).await?;
        Ok::<_, crate::error::Error>((branch.clone(), pr))
    });

    Ok(try_join_all(lookups).await?.into_iter().collect())
}

/// Join units against the PRs of their head branches
pub async fn enrich_units(
    host: &dyn HostService,
    units: &[PrUnit],
    branch_prefix: &str,
) -> Result<Vec<EnrichedPrUnit>> {
    let branches: Vec<String> = units.iter().map(|u| u.head_branch(branch_prefix)).collect();
    let mut prs = find_prs_for_branches(host, &branches).await?;

    Ok(units
        .iter()
        .zip(branches)
        .map(|(unit, head_branch)| EnrichedPrUnit {
            unit: unit.clone(),
            pr: prs.remove(&head_branch).flatten(),
            head_branch,
        })
        .collect())
}
