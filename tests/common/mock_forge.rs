//! In-memory forge for testing sync and land
//!
//! One value plays both the host (PRs) and the remote (branches), so every
//! call lands in a single ordered log. Tests assert on that order, e.g. that
//! a retarget happens before the branch it moves off is deleted.
//!
//! Host behavior that matters for stacking is simulated:
//! - pushing a PR's head commit onto the default branch marks it merged
//! - deleting a branch closes every open PR based on it

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use strata::error::{Error, Result};
use strata::git::VcsService;
use strata::platform::HostService;
use strata::types::{
    ChecksStatus, MergeStatus, PlatformConfig, PrState, PullRequest, ReviewDecision,
};

/// One recorded collaborator call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FindPr(String),
    CreatePr { title: String, head: String, base: String },
    GetMergeStatus(u64),
    GetBaseBranch(u64),
    Retarget { pr_number: u64, new_base: String },
    GetState(u64),
    ListBranches(String),
    GetHeadCommit(String),
    IsAncestor(String, String),
    Push { commit: String, branch: String, force: bool },
    DeleteBranch(String),
    Fetch,
}

/// Fake host + remote
pub struct MockForge {
    config: PlatformConfig,
    default_branch: String,
    next_pr_number: AtomicU64,
    prs: Mutex<HashMap<u64, PullRequest>>,
    branches: Mutex<HashMap<String, String>>,
    statuses: Mutex<HashMap<u64, MergeStatus>>,
    non_fast_forward: Mutex<HashSet<String>>,
    merge_on_push: AtomicBool,
    calls: Mutex<Vec<Call>>,
    // Error injection
    error_on_find_pr: Mutex<Option<String>>,
    error_on_create_pr: Mutex<Option<String>>,
    error_on_retarget: Mutex<Option<String>>,
    error_on_push: Mutex<HashMap<String, String>>,
    // Failures that clear after a number of attempts
    flaky_find_pr: Mutex<Option<(usize, String)>>,
    flaky_push: Mutex<HashMap<String, (usize, String)>>,
    // Simulated host latency for concurrency checks
    latency: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockForge {
    /// Empty forge whose default branch is `main` at `base-sha`
    pub fn new() -> Self {
        let forge = Self {
            config: super::github_config(),
            default_branch: "main".to_string(),
            next_pr_number: AtomicU64::new(1),
            prs: Mutex::new(HashMap::new()),
            branches: Mutex::new(HashMap::new()),
            statuses: Mutex::new(HashMap::new()),
            non_fast_forward: Mutex::new(HashSet::new()),
            merge_on_push: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
            error_on_find_pr: Mutex::new(None),
            error_on_create_pr: Mutex::new(None),
            error_on_retarget: Mutex::new(None),
            error_on_push: Mutex::new(HashMap::new()),
            flaky_find_pr: Mutex::new(None),
            flaky_push: Mutex::new(HashMap::new()),
            latency: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        };
        forge.set_branch("main", "base-sha");
        forge
    }

    // === Setup ===

    /// Create or move a remote branch
    pub fn set_branch(&self, name: &str, tip: &str) {
        self.branches
            .lock()
            .unwrap()
            .insert(name.to_string(), tip.to_string());
    }

    /// Remove a remote branch without recording a call
    pub fn remove_branch(&self, name: &str) {
        self.branches.lock().unwrap().remove(name);
    }

    /// Add a PR directly (bypasses the call log)
    pub fn add_pr(&self, head: &str, base: &str, state: PrState) -> PullRequest {
        let number = self.next_pr_number.fetch_add(1, Ordering::SeqCst);
        let pr = super::make_pr(number, head, base, state);
        self.prs.lock().unwrap().insert(number, pr.clone());
        pr
    }

    /// Set the status a PR reports
    pub fn set_status(&self, pr_number: u64, checks: ChecksStatus, review: ReviewDecision) {
        self.statuses.lock().unwrap().insert(
            pr_number,
            MergeStatus {
                checks,
                review_decision: review,
            },
        );
    }

    /// Make `commit` not a descendant of the default branch
    pub fn mark_not_fast_forward(&self, commit: &str) {
        self.non_fast_forward
            .lock()
            .unwrap()
            .insert(commit.to_string());
    }

    /// Stop simulating the host's merge detection on push
    pub fn disable_merge_on_push(&self) {
        self.merge_on_push.store(false, Ordering::SeqCst);
    }

    // === Error injection ===

    /// Make `find_pr_by_branch` return an error
    pub fn fail_find_pr(&self, msg: &str) {
        *self.error_on_find_pr.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `create_pr` return an error
    pub fn fail_create_pr(&self, msg: &str) {
        *self.error_on_create_pr.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `retarget_pr` return an error
    pub fn fail_retarget(&self, msg: &str) {
        *self.error_on_retarget.lock().unwrap() = Some(msg.to_string());
    }

    /// Make pushes to `branch` return an error
    pub fn fail_push_to(&self, branch: &str, msg: &str) {
        self.error_on_push
            .lock()
            .unwrap()
            .insert(branch.to_string(), msg.to_string());
    }

    /// Make the next `times` calls to `find_pr_by_branch` fail, then recover
    pub fn fail_find_pr_times(&self, times: usize, msg: &str) {
        *self.flaky_find_pr.lock().unwrap() = Some((times, msg.to_string()));
    }

    /// Make the next `times` pushes to `branch` fail, then recover
    pub fn fail_push_times(&self, branch: &str, times: usize, msg: &str) {
        self.flaky_push
            .lock()
            .unwrap()
            .insert(branch.to_string(), (times, msg.to_string()));
    }

    /// Make every `find_pr_by_branch` take `latency` to answer
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    // === Inspection ===

    /// Most `find_pr_by_branch` calls that were ever in progress at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Number of pushes attempted to `branch`, failed ones included
    pub fn push_attempts(&self, branch: &str) -> usize {
        self.pushed_branches().iter().filter(|b| *b == branch).count()
    }

    /// Number of `find_pr_by_branch` calls, failed ones included
    pub fn find_pr_attempts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::FindPr(_)))
            .count()
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Position of the first call equal to `call`
    pub fn position(&self, call: &Call) -> Option<usize> {
        self.calls.lock().unwrap().iter().position(|c| c == call)
    }

    /// Current state of a PR
    pub fn pr(&self, number: u64) -> PullRequest {
        self.prs.lock().unwrap()[&number].clone()
    }

    /// Current tip of a remote branch
    pub fn branch(&self, name: &str) -> Option<String> {
        self.branches.lock().unwrap().get(name).cloned()
    }

    /// Branches that were pushed, in order
    pub fn pushed_branches(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Push { branch, .. } => Some(branch),
                _ => None,
            })
            .collect()
    }

    /// Branches that were deleted, in order
    pub fn deleted_branches(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::DeleteBranch(branch) => Some(branch),
                _ => None,
            })
            .collect()
    }

    /// (head, base) of every `create_pr` call
    pub fn created_prs(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CreatePr { head, base, .. } => Some((head, base)),
                _ => None,
            })
            .collect()
    }

    /// Numbers of retargeted PRs, in order
    pub fn retargeted(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Retarget { pr_number, .. } => Some(pr_number),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn find_pr_failure(&self) -> Option<Error> {
        if let Some(msg) = self.error_on_find_pr.lock().unwrap().as_ref() {
            return Some(Error::Platform(msg.clone()));
        }
        let mut flaky = self.flaky_find_pr.lock().unwrap();
        let (remaining, msg) = flaky.as_mut()?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(Error::Platform(msg.clone()))
    }

    fn push_failure(&self, branch: &str) -> Option<Error> {
        if let Some(msg) = self.error_on_push.lock().unwrap().get(branch) {
            return Some(Error::Git(msg.clone()));
        }
        let mut flaky = self.flaky_push.lock().unwrap();
        let (remaining, msg) = flaky.get_mut(branch)?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(Error::Git(msg.clone()))
    }

    fn get_pr(&self, pr_number: u64) -> Result<PullRequest> {
        self.prs
            .lock()
            .unwrap()
            .get(&pr_number)
            .cloned()
            .ok_or(Error::PrNotFound(pr_number))
    }
}

#[async_trait]
impl HostService for MockForge {
    async fn find_pr_by_branch(&self, branch: &str) -> Result<Option<PullRequest>> {
        self.record(Call::FindPr(branch.to_string()));
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(latency).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        if let Some(err) = self.find_pr_failure() {
            return Err(err);
        }

        let prs = self.prs.lock().unwrap();
        let mut matching: Vec<&PullRequest> =
            prs.values().filter(|pr| pr.head_ref == branch).collect();
        matching.sort_by_key(|pr| std::cmp::Reverse(pr.number));
        Ok(matching
            .iter()
            .find(|pr| pr.state == PrState::Open)
            .or_else(|| matching.first())
            .map(|pr| (*pr).clone()))
    }

    async fn create_pr(
        &self,
        title: &str,
        head: &str,
        base: &str,
        _body: Option<&str>,
    ) -> Result<PullRequest> {
        self.record(Call::CreatePr {
            title: title.to_string(),
            head: head.to_string(),
            base: base.to_string(),
        });
        if let Some(msg) = self.error_on_create_pr.lock().unwrap().as_ref() {
            return Err(Error::Platform(msg.clone()));
        }

        let mut pr = self.add_pr(head, base, PrState::Open);
        pr.title = title.to_string();
        self.prs.lock().unwrap().insert(pr.number, pr.clone());
        Ok(pr)
    }

    async fn get_merge_status(&self, pr_number: u64) -> Result<MergeStatus> {
        self.record(Call::GetMergeStatus(pr_number));
        self.get_pr(pr_number)?;
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(&pr_number)
            .copied()
            .unwrap_or(MergeStatus {
                checks: ChecksStatus::Passing,
                review_decision: ReviewDecision::Approved,
            }))
    }

    async fn get_base_branch(&self, pr_number: u64) -> Result<String> {
        self.record(Call::GetBaseBranch(pr_number));
        Ok(self.get_pr(pr_number)?.base_ref)
    }

    async fn retarget_pr(&self, pr_number: u64, new_base: &str) -> Result<()> {
        self.record(Call::Retarget {
            pr_number,
            new_base: new_base.to_string(),
        });
        if let Some(msg) = self.error_on_retarget.lock().unwrap().as_ref() {
            return Err(Error::Platform(msg.clone()));
        }

        let mut prs = self.prs.lock().unwrap();
        let pr = prs.get_mut(&pr_number).ok_or(Error::PrNotFound(pr_number))?;
        if pr.state != PrState::Open {
            return Err(Error::Platform(format!("PR #{pr_number} is {}", pr.state)));
        }
        pr.base_ref = new_base.to_string();
        Ok(())
    }

    async fn get_state(&self, pr_number: u64) -> Result<PrState> {
        self.record(Call::GetState(pr_number));
        Ok(self.get_pr(pr_number)?.state)
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}

#[async_trait]
impl VcsService for MockForge {
    async fn list_branches(&self, pattern: &str) -> Result<HashMap<String, String>> {
        self.record(Call::ListBranches(pattern.to_string()));
        let prefix = pattern.trim_end_matches('*');
        Ok(self
            .branches
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, tip)| (name.clone(), tip.clone()))
            .collect())
    }

    async fn get_head_commit(&self, branch: &str) -> Option<String> {
        self.record(Call::GetHeadCommit(branch.to_string()));
        self.branch(branch)
    }

    async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> bool {
        self.record(Call::IsAncestor(
            ancestor.to_string(),
            descendant.to_string(),
        ));
        !self.non_fast_forward.lock().unwrap().contains(descendant)
    }

    async fn push(&self, commit: &str, branch: &str, force: bool) -> Result<()> {
        self.record(Call::Push {
            commit: commit.to_string(),
            branch: branch.to_string(),
            force,
        });
        if let Some(err) = self.push_failure(branch) {
            return Err(err);
        }

        self.set_branch(branch, commit);

        if branch == self.default_branch && self.merge_on_push.load(Ordering::SeqCst) {
            let branches = self.branches.lock().unwrap().clone();
            for pr in self.prs.lock().unwrap().values_mut() {
                if pr.state == PrState::Open && branches.get(&pr.head_ref).map(String::as_str) == Some(commit) {
                    pr.state = PrState::Merged;
                }
            }
        }
        Ok(())
    }

    async fn delete_branch(&self, branch: &str) -> Result<()> {
        self.record(Call::DeleteBranch(branch.to_string()));
        self.branches.lock().unwrap().remove(branch);

        // The host closes PRs whose base disappears
        for pr in self.prs.lock().unwrap().values_mut() {
            if pr.state == PrState::Open && pr.base_ref == branch {
                pr.state = PrState::Closed;
            }
        }
        Ok(())
    }

    async fn fetch(&self) -> Result<()> {
        self.record(Call::Fetch);
        Ok(())
    }
}
