//! strata - stacked pull requests from commit trailers
//!
//! Each commit ahead of the default branch (or each contiguous run of commits
//! sharing a `Strata-Group` trailer) becomes one pull request, based on the
//! PR below it. The library provides:
//!
//! - [`stack`]: parsing and validating the stack from commit trailers
//! - [`sync`]: reconciling the remote PR chain with the local stack
//! - [`land`]: landing ready PRs bottom-up by fast-forward
//! - [`retry`]: bounded, retrying access to the host API
//!
//! Remote effects go through the [`platform::HostService`] and
//! [`git::VcsService`] traits so the reconciler and land protocol can run
//! against fakes.

pub mod auth;
pub mod config;
pub mod error;
pub mod git;
pub mod land;
pub mod platform;
pub mod progress;
pub mod retry;
pub mod stack;
pub mod sync;
pub mod types;
