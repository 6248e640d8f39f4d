//! Resolving user selectors to PR units

use crate::error::{Error, Result};
use crate::types::PrUnit;
use std::collections::HashSet;

/// Shortest prefix accepted when matching ids or hashes
const MIN_PREFIX_LEN: usize = 4;

/// Which units a sync run may open PRs for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Exactly these selectors
    Only(Vec<String>),
    /// Every unit from the bottom up to and including this selector
    UpTo(String),
}

/// Find the index of the unit a selector refers to
///
/// An exact unit-id match wins. Otherwise the selector must be a unique
/// prefix of a unit id or of one of a unit's commit hashes.
pub fn find_unit(units: &[PrUnit], selector: &str) -> Result<usize> {
    if let Some(index) = units.iter().position(|u| u.id == selector) {
        return Ok(index);
    }

    if selector.len() < MIN_PREFIX_LEN {
        return Err(Error::UnitNotFound(selector.to_string()));
    }

    let matches: Vec<usize> = units
        .iter()
        .enumerate()
        .filter(|(_, u)| {
            u.id.starts_with(selector) || u.commit_hashes.iter().any(|h| h.starts_with(selector))
        })
        .map(|(i, _)| i)
        .collect();

    match matches.as_slice() {
        [] => Err(Error::UnitNotFound(selector.to_string())),
        [index] => Ok(*index),
        _ => Err(Error::AmbiguousSelector {
            selector: selector.to_string(),
            candidates: matches.iter().map(|&i| units[i].id.clone()).collect(),
        }),
    }
}

/// Resolve a selection to the set of selected unit ids
pub fn resolve_selection(units: &[PrUnit], selection: &Selection) -> Result<HashSet<String>> {
    match selection {
        Selection::Only(selectors) => selectors
            .iter()
            .map(|s| find_unit(units, s).map(|i| units[i].id.clone()))
            .collect(),
        Selection::UpTo(selector) => {
            let last = find_unit(units, selector)?;
            Ok(units[..=last].iter().map(|u| u.id.clone()).collect())
        }
    }
}
