//! VCS decorator that routes network-bound git calls through the retry layer

use crate::error::Result;
use crate::git::VcsService;
use crate::retry::ApiLimiter;
use async_trait::async_trait;
use std::collections::HashMap;

/// Wraps a [`VcsService`] so pushes, deletions, listings and fetches are
/// admitted by an [`ApiLimiter`]
///
/// The local checks (`get_head_commit`, `is_ancestor`) report failure as
/// `None`/`false` and carry no message to classify, so they pass through.
pub struct RetryingVcs<V> {
    inner: V,
    limiter: ApiLimiter,
}

impl<V: VcsService> RetryingVcs<V> {
    /// Wrap `inner` with `limiter`
    pub const fn new(inner: V, limiter: ApiLimiter) -> Self {
        Self { inner, limiter }
    }

    /// The wrapped service
    pub const fn inner(&self) -> &V {
        &self.inner
    }
}

#[async_trait]
impl<V: VcsService> VcsService for RetryingVcs<V> {
    async fn list_branches(&self, pattern: &str) -> Result<HashMap<String, String>> {
        self.limiter
            .run("list_branches", || self.inner.list_branches(pattern))
            .await
    }

    async fn get_head_commit(&self, branch: &str) -> Option<String> {
        self.inner.get_head_commit(branch).await
    }

    async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> bool {
        self.inner.is_ancestor(ancestor, descendant).await
    }

    async fn push(&self, commit: &str, branch: &str, force: bool) -> Result<()> {
        self.limiter
            .run("push", || self.inner.push(commit, branch, force))
            .await
    }

    async fn delete_branch(&self, branch: &str) -> Result<()> {
        self.limiter
            .run("delete_branch", || self.inner.delete_branch(branch))
            .await
    }

    async fn fetch(&self) -> Result<()> {
        self.limiter.run("fetch", || self.inner.fetch()).await
    }
}
