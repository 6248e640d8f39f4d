//! Git operations
//!
//! [`VcsService`] is the narrow surface the sync reconciler and land protocol
//! need. [`GitCli`] implements it by running `git` subprocesses, and also
//! reads the stack itself (commits and group titles) for the CLI.
//! [`RetryingVcs`] puts its network calls behind the shared retry layer.

mod log;
mod retrying;

pub use log::{LOG_FORMAT, parse_log_output, parse_trailers};
pub use retrying::RetryingVcs;

use crate::error::{Error, Result};
use crate::types::Commit;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Ref holding the group id -> title JSON blob
pub const GROUP_TITLES_REF: &str = "refs/strata/group-titles";

/// Fallback when the remote HEAD is not known locally
const FALLBACK_DEFAULT_BRANCH: &str = "main";

/// VCS collaborator used by sync and land
///
/// Query calls report failure as `None`/`false`; mutating calls return
/// an error.
#[async_trait]
pub trait VcsService: Send + Sync {
    /// Remote branches matching `pattern` (a `refs/heads/` glob), mapped to their tips
    async fn list_branches(&self, pattern: &str) -> Result<HashMap<String, String>>;

    /// Tip commit of a remote branch, if it exists
    async fn get_head_commit(&self, branch: &str) -> Option<String>;

    /// Whether `ancestor` is an ancestor of (or equal to) `descendant`
    async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> bool;

    /// Point remote `branch` at `commit`
    async fn push(&self, commit: &str, branch: &str, force: bool) -> Result<()>;

    /// Delete a remote branch (deleting a missing branch succeeds)
    async fn delete_branch(&self, branch: &str) -> Result<()>;

    /// Fetch from the remote
    async fn fetch(&self) -> Result<()>;
}

/// `git` subprocess implementation
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_root: PathBuf,
    remote: String,
}

/// Top of the work tree containing `path`
pub async fn find_repo_root(path: &Path) -> Result<PathBuf> {
    let output = run_git(path, &["rev-parse", "--show-toplevel"]).await?;
    Ok(PathBuf::from(output.trim()))
}

impl GitCli {
    /// Operate on the repository at `repo_root`, talking to `remote`
    pub fn new(repo_root: PathBuf, remote: impl Into<String>) -> Self {
        Self {
            repo_root,
            remote: remote.into(),
        }
    }

    /// Remote name
    pub fn remote(&self) -> &str {
        &self.remote
    }

    async fn git(&self, args: &[&str]) -> Result<String> {
        run_git(&self.repo_root, args).await
    }

    async fn query(&self, args: &[&str]) -> Option<String> {
        match self.git(args).await {
            Ok(out) => Some(out),
            Err(e) => {
                debug!(error = %e, "git query failed");
                None
            }
        }
    }

    /// URL of the configured remote
    pub async fn remote_url(&self) -> Result<String> {
        self.query(&["remote", "get-url", &self.remote])
            .await
            .map(|url| url.trim().to_string())
            .ok_or_else(|| Error::RemoteNotFound(self.remote.clone()))
    }

    /// Default branch, as recorded by `refs/remotes/<remote>/HEAD`
    pub async fn default_branch(&self) -> String {
        let head_ref = format!("refs/remotes/{}/HEAD", self.remote);
        let prefix = format!("{}/", self.remote);

        self.query(&["symbolic-ref", "--short", &head_ref])
            .await
            .and_then(|out| out.trim().strip_prefix(&prefix).map(str::to_string))
            .filter(|branch| !branch.is_empty())
            .unwrap_or_else(|| FALLBACK_DEFAULT_BRANCH.to_string())
    }

    /// Commits ahead of `<remote>/<default_branch>`, oldest first
    pub async fn read_stack_commits(&self, default_branch: &str) -> Result<Vec<Commit>> {
        let range = format!("{}/{default_branch}..HEAD", self.remote);
        let output = self
            .git(&["log", "--reverse", "--no-color", LOG_FORMAT, &range])
            .await?;
        let commits = parse_log_output(&output);
        debug!(count = commits.len(), range, "read stack commits");
        Ok(commits)
    }

    /// Group titles stored at [`GROUP_TITLES_REF`]; missing ref is an empty map
    pub async fn read_group_titles(&self) -> Result<HashMap<String, String>> {
        let Some(blob) = self.query(&["cat-file", "blob", GROUP_TITLES_REF]).await else {
            return Ok(HashMap::new());
        };
        serde_json::from_str(&blob)
            .map_err(|e| Error::Git(format!("malformed {GROUP_TITLES_REF}: {e}")))
    }
}

async fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    debug!(?args, "running git");
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| Error::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Git(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse `git ls-remote` output into branch name -> tip
fn parse_ls_remote(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| {
            let (sha, name) = line.split_once('\t')?;
            let branch = name.trim().strip_prefix("refs/heads/")?;
            Some((branch.to_string(), sha.trim().to_string()))
        })
        .collect()
}

#[async_trait]
impl VcsService for GitCli {
    async fn list_branches(&self, pattern: &str) -> Result<HashMap<String, String>> {
        let refspec = format!("refs/heads/{pattern}");
        let output = self
            .git(&["ls-remote", "--heads", &self.remote, &refspec])
            .await?;
        let branches = parse_ls_remote(&output);
        debug!(pattern, count = branches.len(), "listed remote branches");
        Ok(branches)
    }

    async fn get_head_commit(&self, branch: &str) -> Option<String> {
        let refname = format!("refs/heads/{branch}");
        let output = self.query(&["ls-remote", &self.remote, &refname]).await?;
        parse_ls_remote(&output).remove(branch)
    }

    async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> bool {
        self.query(&["merge-base", "--is-ancestor", ancestor, descendant])
            .await
            .is_some()
    }

    async fn push(&self, commit: &str, branch: &str, force: bool) -> Result<()> {
        let refspec = format!("{commit}:refs/heads/{branch}");
        let mut args = vec!["push"];
        if force {
            args.push("--force");
        }
        args.extend([self.remote.as_str(), refspec.as_str()]);

        debug!(branch, commit, force, "pushing");
        self.git(&args).await?;
        Ok(())
    }

    async fn delete_branch(&self, branch: &str) -> Result<()> {
        debug!(branch, "deleting remote branch");
        match self.git(&["push", &self.remote, "--delete", branch]).await {
            Ok(_) => Ok(()),
            Err(Error::Git(msg)) if msg.contains("remote ref does not exist") => {
                debug!(branch, "branch already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch(&self) -> Result<()> {
        debug!(remote = %self.remote, "fetching");
        self.git(&["fetch", &self.remote]).await?;
        Ok(())
    }
}
