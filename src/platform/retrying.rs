//! Host decorator that routes every call through the retry layer

use crate::error::Result;
use crate::platform::HostService;
use crate::retry::ApiLimiter;
use crate::types::{MergeStatus, PlatformConfig, PrState, PullRequest};
use async_trait::async_trait;

/// Wraps a [`HostService`] so each call is admitted by an [`ApiLimiter`]
pub struct RetryingHost<H> {
    inner: H,
    limiter: ApiLimiter,
}

impl<H: HostService> RetryingHost<H> {
    /// Wrap `inner` with `limiter`
    pub const fn new(inner: H, limiter: ApiLimiter) -> Self {
        Self { inner, limiter }
    }

    /// The wrapped service
    pub const fn inner(&self) -> &H {
        &self.inner
    }
}

#[async_trait]
impl<H: HostService> HostService for RetryingHost<H> {
    async fn find_pr_by_branch(&self, branch: &str) -> Result<Option<PullRequest>> {
        self.limiter
            .run("find_pr_by_branch", || self.inner.find_pr_by_branch(branch))
            .await
    }

    async fn create_pr(
        &self,
        title: &str,
        head: &str,
        base: &str,
        body: Option<&str>,
    ) -> Result<PullRequest> {
        self.limiter
            .run("create_pr", || self.inner.create_pr(title, head, base, body))
            .await
    }

    async fn get_merge_status(&self, pr_number: u64) -> Result<MergeStatus> {
        self.limiter
            .run("get_merge_status", || self.inner.get_merge_status(pr_number))
            .await
    }

    async fn get_base_branch(&self, pr_number: u64) -> Result<String> {
        self.limiter
            .run("get_base_branch", || self.inner.get_base_branch(pr_number))
            .await
    }

    async fn retarget_pr(&self, pr_number: u64, new_base: &str) -> Result<()> {
        self.limiter
            .run("retarget_pr", || self.inner.retarget_pr(pr_number, new_base))
            .await
    }

    async fn get_state(&self, pr_number: u64) -> Result<PrState> {
        self.limiter
            .run("get_state", || self.inner.get_state(pr_number))
            .await
    }

    fn config(&self) -> &PlatformConfig {
        self.inner.config()
    }
}
