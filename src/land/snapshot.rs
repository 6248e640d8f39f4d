//! Land phase 1 - candidate selection and readiness snapshots

use crate::error::Result;
use crate::platform::HostService;
use crate::types::{EnrichedPrUnit, MergeSnapshot, PullRequest};
use futures::future::try_join_all;
use std::collections::HashMap;
use tracing::debug;

/// An open PR eligible for landing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandCandidate {
    /// Unit id
    pub unit_id: String,
    /// Head branch of the unit
    pub head_branch: String,
    /// The open PR
    pub pr: PullRequest,
}

/// Open PRs of the stack, bottom-up
pub fn land_candidates(units: &[EnrichedPrUnit]) -> Vec<LandCandidate> {
    units
        .iter()
        .filter_map(|u| {
            u.open_pr().map(|pr| LandCandidate {
                unit_id: u.unit.id.clone(),
                head_branch: u.head_branch.clone(),
                pr: pr.clone(),
            })
        })
        .collect()
}

/// Capture a readiness snapshot for every candidate, concurrently
///
/// Nothing is mutated here. The returned map is the only readiness input the
/// walk consults.
pub async fn capture_snapshots(
    host: &dyn HostService,
    candidates: &[LandCandidate],
) -> Result<HashMap<u64, MergeSnapshot>> {
    let fetches = candidates.iter().map(|candidate| async move {
        let number = candidate.pr.number;
        let status = host.get_merge_status(number).await?;
        let snapshot = MergeSnapshot::capture(number, status);
        debug!(pr_number = number, ready = snapshot.is_ready, "captured snapshot");
        Ok::<_, crate::error::Error>((number, snapshot))
    });

    Ok(try_join_all(fetches).await?.into_iter().collect())
}
