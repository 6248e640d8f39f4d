//! Stack parsing - pure functions turning commits into PR units
//!
//! No I/O happens here. Commits come in oldest first and units come out in
//! the same order; nothing downstream re-sorts them.

use crate::error::StackError;
use crate::types::{Commit, PrUnit, UnitKind, short_hash};
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

/// Trailer carrying the stable per-commit identifier
pub const COMMIT_ID_TRAILER: &str = "Strata-Commit-Id";

/// Trailer carrying the group identifier shared by a unit's commits
pub const GROUP_TRAILER: &str = "Strata-Group";

/// Trailer optionally recording a group's title on its commits
pub const GROUP_TITLE_TRAILER: &str = "Strata-Group-Title";

/// Parse an ordered commit list (oldest first) into PR units
///
/// Titles for groups come only from `group_titles` (persisted outside of
/// history); a group without an entry has no title. Singles are titled by
/// their commit subject.
///
/// Returns a [`StackError`] if a group is split by foreign commits or if a
/// group's commits disagree on its title.
pub fn parse_stack<S: BuildHasher>(
    commits: &[Commit],
    group_titles: &HashMap<String, String, S>,
) -> Result<Vec<PrUnit>, StackError> {
    let units = build_units(commits, group_titles);

    check_contiguity(commits)?;
    check_group_titles(commits)?;

    Ok(units)
}

fn build_units<S: BuildHasher>(
    commits: &[Commit],
    group_titles: &HashMap<String, String, S>,
) -> Vec<PrUnit> {
    let mut units: Vec<PrUnit> = Vec::new();
    let mut open_group: Option<&str> = None;

    for commit in commits {
        let commit_id = commit.trailer(COMMIT_ID_TRAILER);

        match commit.trailer(GROUP_TRAILER) {
            Some(group) if open_group == Some(group) => {
                // Continuing the open group; it is always the last unit
                if let Some(unit) = units.last_mut() {
                    push_member(unit, commit, commit_id);
                }
            }
            Some(group) => {
                open_group = Some(group);
                let mut unit = PrUnit {
                    kind: UnitKind::Group,
                    id: group.to_string(),
                    title: group_titles.get(group).cloned(),
                    commit_ids: Vec::new(),
                    commit_hashes: Vec::new(),
                };
                push_member(&mut unit, commit, commit_id);
                units.push(unit);
            }
            None => {
                open_group = None;
                units.push(PrUnit {
                    kind: UnitKind::Single,
                    id: commit_id.map_or_else(|| short_hash(&commit.hash).to_string(), str::to_string),
                    title: Some(commit.subject.clone()),
                    commit_ids: commit_id.map(str::to_string).into_iter().collect(),
                    commit_hashes: vec![commit.hash.clone()],
                });
            }
        }
    }

    units
}

fn push_member(unit: &mut PrUnit, commit: &Commit, commit_id: Option<&str>) {
    unit.commit_hashes.push(commit.hash.clone());
    if let Some(id) = commit_id {
        unit.commit_ids.push(id.to_string());
    }
}

/// Verify every group's commits are index-contiguous in the full list
///
/// Groups are checked in order of first appearance so the reported error is
/// deterministic.
fn check_contiguity(commits: &[Commit]) -> Result<(), StackError> {
    let mut order: Vec<&str> = Vec::new();
    let mut positions: HashMap<&str, Vec<usize>> = HashMap::new();

    for (index, commit) in commits.iter().enumerate() {
        if let Some(group) = commit.trailer(GROUP_TRAILER) {
            let entry = positions.entry(group).or_default();
            if entry.is_empty() {
                order.push(group);
            }
            entry.push(index);
        }
    }

    for group in order {
        let indices = &positions[group];
        let Some(gap) = indices.windows(2).find(|pair| pair[1] != pair[0] + 1) else {
            continue;
        };

        return Err(StackError::SplitGroup {
            group_id: group.to_string(),
            commit_hashes: indices.iter().map(|&i| commits[i].hash.clone()).collect(),
            interrupting: commits[gap[0] + 1..gap[1]]
                .iter()
                .map(|c| c.hash.clone())
                .collect(),
        });
    }

    Ok(())
}

/// Verify no group declares two different titles in its trailers
fn check_group_titles(commits: &[Commit]) -> Result<(), StackError> {
    let mut order: Vec<&str> = Vec::new();
    let mut titles: HashMap<&str, BTreeMap<String, String>> = HashMap::new();

    for commit in commits {
        let (Some(group), Some(title)) = (
            commit.trailer(GROUP_TRAILER),
            commit.trailer(GROUP_TITLE_TRAILER),
        ) else {
            continue;
        };
        let entry = titles.entry(group).or_default();
        if entry.is_empty() {
            order.push(group);
        }
        entry.insert(commit.hash.clone(), title.to_string());
    }

    for group in order {
        let declared = &titles[group];
        let mut distinct: Vec<&String> = declared.values().collect();
        distinct.sort();
        distinct.dedup();
        if distinct.len() > 1 {
            return Err(StackError::InconsistentGroupTitle {
                group_id: group.to_string(),
                titles: declared.clone(),
            });
        }
    }

    Ok(())
}
