//! Shared command context for CLI commands
//!
//! Extracts common setup code shared by view, sync, and land.

use std::path::Path;
use strata::auth::get_github_auth;
use strata::config::{Config, load_config};
use strata::error::Result;
use strata::git::{GitCli, RetryingVcs, find_repo_root};
use strata::platform::{GitHubService, RetryingHost, parse_repo_info};
use strata::retry::ApiLimiter;
use strata::stack::parse_stack;
use strata::types::PrUnit;
use tracing::debug;

/// Shared context for CLI commands
///
/// Opens the repository, loads configuration once, and settles the remote
/// and default branch. Host access is set up separately by [`Self::connect`]
/// because `view` works offline.
pub struct CommandContext {
    /// Git access for the repository
    pub git: GitCli,
    /// Loaded configuration
    pub config: Config,
    /// Default branch name (e.g., "main")
    pub default_branch: String,
    /// Shared by every host call and git network call of the command
    limiter: ApiLimiter,
}

impl CommandContext {
    /// Create a new command context
    pub async fn new(path: &Path, remote: Option<&str>) -> Result<Self> {
        let repo_root = find_repo_root(path).await?;
        let config = load_config(&repo_root)?;

        let remote_name = remote.map_or_else(|| config.remote.clone(), str::to_string);
        let git = GitCli::new(repo_root, remote_name);

        let default_branch = match &config.default_branch {
            Some(branch) => branch.clone(),
            None => git.default_branch().await,
        };
        debug!(remote = git.remote(), %default_branch, "command context ready");

        let limiter = ApiLimiter::new(config.retry.concurrency, config.retry.policy());
        Ok(Self {
            git,
            config,
            default_branch,
            limiter,
        })
    }

    /// Read and validate the stack
    pub async fn read_units(&self) -> Result<Vec<PrUnit>> {
        let commits = self.git.read_stack_commits(&self.default_branch).await?;
        let titles = self.git.read_group_titles().await?;
        Ok(parse_stack(&commits, &titles)?)
    }

    /// Git access for remote mutations, retried like host calls
    pub fn vcs(&self) -> RetryingVcs<GitCli> {
        RetryingVcs::new(self.git.clone(), self.limiter.clone())
    }

    /// Connect to the host for the configured remote
    ///
    /// Every call on the returned service goes through the same limiter as
    /// [`Self::vcs`].
    pub async fn connect(&self) -> Result<RetryingHost<GitHubService>> {
        let url = self.git.remote_url().await?;
        let platform = parse_repo_info(&url)?;
        let auth = get_github_auth(platform.host.as_deref()).await?;
        debug!(source = %auth.source, owner = %platform.owner, repo = %platform.repo, "authenticated");

        let service = GitHubService::new(&auth.token, platform.owner, platform.repo, platform.host)?;
        Ok(RetryingHost::new(service, self.limiter.clone()))
    }
}
