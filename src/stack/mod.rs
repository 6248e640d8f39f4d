//! Stack model
//!
//! Turns the commits ahead of the default branch into an ordered list of
//! PR units and validates the trailer arrangement. Everything here is pure.

mod parse;
mod select;

pub use parse::{COMMIT_ID_TRAILER, GROUP_TITLE_TRAILER, GROUP_TRAILER, parse_stack};
pub use select::{Selection, find_unit, resolve_selection};
