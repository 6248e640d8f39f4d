//! Shared test helpers

#![allow(dead_code)]

mod mock_forge;

pub use mock_forge::{Call, MockForge};

use std::collections::HashMap;
use strata::config::Config;
use strata::stack::{COMMIT_ID_TRAILER, GROUP_TRAILER, parse_stack};
use strata::types::{Commit, EnrichedPrUnit, PlatformConfig, PrState, PrUnit, PullRequest};

/// Build a commit with the given trailers
pub fn make_commit(hash: &str, subject: &str, trailers: &[(&str, &str)]) -> Commit {
    Commit {
        hash: hash.to_string(),
        subject: subject.to_string(),
        body: String::new(),
        trailers: trailers
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
    }
}

/// A commit with a commit-id trailer and no group
pub fn single(hash: &str, id: &str) -> Commit {
    make_commit(hash, &format!("Commit {id}"), &[(COMMIT_ID_TRAILER, id)])
}

/// A commit with a commit-id trailer in `group`
pub fn grouped(hash: &str, id: &str, group: &str) -> Commit {
    make_commit(
        hash,
        &format!("Commit {id}"),
        &[(COMMIT_ID_TRAILER, id), (GROUP_TRAILER, group)],
    )
}

/// A linear stack of singles: unit `id` has head commit `<id>-sha`
pub fn make_units(ids: &[&str]) -> Vec<PrUnit> {
    let commits: Vec<Commit> = ids
        .iter()
        .map(|id| single(&format!("{id}-sha"), id))
        .collect();
    parse_stack(&commits, &HashMap::new()).unwrap()
}

/// Head branch for a unit id under the default prefix
pub fn branch(id: &str) -> String {
    format!("strata/{id}")
}

/// Join units with PRs, like `enrich_units` does
pub fn enrich(units: &[PrUnit], prs: &[Option<PullRequest>]) -> Vec<EnrichedPrUnit> {
    units
        .iter()
        .zip(prs)
        .map(|(unit, pr)| EnrichedPrUnit {
            unit: unit.clone(),
            head_branch: branch(&unit.id),
            pr: pr.clone(),
        })
        .collect()
}

/// A PR from `head` into `base`
pub fn make_pr(number: u64, head: &str, base: &str, state: PrState) -> PullRequest {
    PullRequest {
        number,
        html_url: format!("https://github.com/test/repo/pull/{number}"),
        base_ref: base.to_string(),
        head_ref: head.to_string(),
        title: format!("PR for {head}"),
        state,
    }
}

/// Default test GitHub config
pub fn github_config() -> PlatformConfig {
    PlatformConfig {
        owner: "test".to_string(),
        repo: "repo".to_string(),
        host: None,
    }
}

/// Config with defaults
pub fn test_config() -> Config {
    Config::default()
}
