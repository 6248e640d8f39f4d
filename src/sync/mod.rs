//! Sync reconciler
//!
//! Keeps the remote PR chain consistent with the local stack:
//! 1. Gather - batch-resolve PRs, list remote branch tips (effectful)
//! 2. Retire - retarget dependents of merged PRs, then delete merged branches
//! 3. Plan - decide an action per unit (pure, testable)
//! 4. Execute - push branches, open PRs, fix bases (effectful, per-unit failures collected)

mod execute;
mod plan;

pub use execute::{Retirement, SyncFailure, SyncOptions, SyncReport, retire_merged, run_sync};
pub use plan::{SyncAction, SyncPlanEntry, SyncPlanOptions, plan_sync};
