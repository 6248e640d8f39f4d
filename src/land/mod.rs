//! Land protocol for stacked PRs
//!
//! Three phases:
//! 1. Snapshot - capture readiness for every open PR at once (no mutation)
//! 2. Walk - land bottom-up by fast-forwarding the default branch, moving
//!    dependents onto the default branch before their base goes away
//! 3. Cleanup - delete landed head branches, in landing order, after the walk
//!
//! Landing is incremental: an error stops the walk but keeps what already
//! landed, and re-running picks up where it stopped.

mod execute;
mod snapshot;

pub use execute::{LandMode, LandOptions, LandReport, LandedPr, StoppedAt, land_stack};
pub use snapshot::{LandCandidate, capture_snapshots, land_candidates};
