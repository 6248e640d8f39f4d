//! GitHub host service implementation

use crate::error::{Error, Result};
use crate::platform::HostService;
use crate::types::{ChecksStatus, MergeStatus, PlatformConfig, PrState, PullRequest, ReviewDecision};
use async_trait::async_trait;
use octocrab::Octocrab;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

// GraphQL response types for the review decision query

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct ReviewDecisionData {
    repository: Option<ReviewDecisionRepository>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewDecisionRepository {
    pull_request: Option<ReviewDecisionPullRequest>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewDecisionPullRequest {
    review_decision: Option<String>,
}

/// Combined status already aggregates every context into one state
const COMBINED_STATUS: &str = "status";

/// Check runs are paginated; 100 is the largest page GitHub serves
const CHECK_RUNS: &str = "check-runs?per_page=100";

fn commit_url(api_host: &str, config: &PlatformConfig, sha: &str, endpoint: &str) -> String {
    format!(
        "https://{api_host}/repos/{}/{}/commits/{sha}/{endpoint}",
        config.owner, config.repo
    )
}

#[derive(Deserialize)]
struct CombinedStatus {
    state: String,
    total_count: u32,
}

#[derive(Deserialize)]
struct CheckRuns {
    check_runs: Vec<CheckRun>,
}

#[derive(Deserialize)]
struct CheckRun {
    status: String,
    conclusion: Option<String>,
}

fn combined_status(combined: &CombinedStatus) -> ChecksStatus {
    match combined.state.as_str() {
        _ if combined.total_count == 0 => ChecksStatus::Passing,
        "success" => ChecksStatus::Passing,
        "pending" => ChecksStatus::Pending,
        _ => ChecksStatus::Failing,
    }
}

/// A completed run without an acceptable conclusion fails the whole set
fn check_runs_status(runs: &CheckRuns) -> ChecksStatus {
    let mut verdict = ChecksStatus::Passing;
    for run in &runs.check_runs {
        if run.status != "completed" {
            verdict = ChecksStatus::Pending;
            continue;
        }
        if !matches!(
            run.conclusion.as_deref(),
            Some("success" | "neutral" | "skipped")
        ) {
            return ChecksStatus::Failing;
        }
    }
    verdict
}

/// GitHub PR host backed by octocrab
pub struct GitHubService {
    client: Octocrab,
    config: PlatformConfig,
    token: String,
    /// Plain client for the CI endpoints octocrab does not model
    http_client: Client,
    /// `api.github.com`, or `<host>/api/v3` for Enterprise
    api_host: String,
}

impl GitHubService {
    /// Connect with a personal access token; `host` selects GitHub Enterprise
    pub fn new(token: &str, owner: String, repo: String, host: Option<String>) -> Result<Self> {
        let mut builder = Octocrab::builder().personal_token(token.to_string());

        let api_host = match &host {
            Some(h) => {
                let api_host = format!("{h}/api/v3");
                builder = builder
                    .base_uri(format!("https://{api_host}"))
                    .map_err(|e| Error::GitHubApi(e.to_string()))?;
                api_host
            }
            None => "api.github.com".to_string(),
        };

        let client = builder
            .build()
            .map_err(|e| Error::GitHubApi(e.to_string()))?;

        let http_client = Client::builder()
            .user_agent("strata")
            .build()
            .map_err(|e| Error::GitHubApi(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: PlatformConfig { owner, repo, host },
            token: token.to_string(),
            http_client,
            api_host,
        })
    }

    async fn get_raw_pr(&self, pr_number: u64) -> Result<octocrab::models::pulls::PullRequest> {
        self.client
            .pulls(&self.config.owner, &self.config.repo)
            .get(pr_number)
            .await
            .map_err(|e| match Error::from(e) {
                Error::GitHubApi(msg) if msg.starts_with("404") => Error::PrNotFound(pr_number),
                other => other,
            })
    }

    /// Fold legacy commit statuses and check runs into one verdict
    ///
    /// External CI reports through statuses, Actions through check runs.
    /// Failing beats pending; nothing configured counts as passing.
    async fn check_ci_status(&self, sha: &str) -> Result<ChecksStatus> {
        let statuses = match self.get_raw(&self.commit_url(sha, COMBINED_STATUS)).await? {
            Some(response) => combined_status(&response.json().await?),
            None => ChecksStatus::Passing,
        };
        let runs = match self.get_raw(&self.commit_url(sha, CHECK_RUNS)).await? {
            Some(response) => check_runs_status(&response.json().await?),
            None => ChecksStatus::Passing,
        };

        debug!(sha, ?statuses, ?runs, "CI status");
        Ok(match (statuses, runs) {
            (ChecksStatus::Failing, _) | (_, ChecksStatus::Failing) => ChecksStatus::Failing,
            (ChecksStatus::Pending, _) | (_, ChecksStatus::Pending) => ChecksStatus::Pending,
            _ => ChecksStatus::Passing,
        })
    }

    fn commit_url(&self, sha: &str, endpoint: &str) -> String {
        commit_url(&self.api_host, &self.config, sha, endpoint)
    }

    /// GET a raw REST endpoint; `None` means "treat as not configured"
    async fn get_raw(&self, url: &str) -> Result<Option<reqwest::Response>> {
        let response = self
            .http_client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(Some(response));
        }
        // Retryable failures must surface so the retry layer sees them
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(Error::GitHubApi(format!("{} {url}", status.as_u16())));
        }

        debug!(%status, url, "CI endpoint unavailable, assuming nothing configured");
        Ok(None)
    }

    /// Query the review decision via GraphQL (REST has no equivalent)
    async fn review_decision(&self, pr_number: u64) -> Result<ReviewDecision> {
        let response: GraphQlResponse<ReviewDecisionData> = self
            .client
            .graphql(&serde_json::json!({
                "query": r"
                    query ReviewDecision($owner: String!, $repo: String!, $number: Int!) {
                        repository(owner: $owner, name: $repo) {
                            pullRequest(number: $number) {
                                reviewDecision
                            }
                        }
                    }
                ",
                "variables": {
                    "owner": self.config.owner,
                    "repo": self.config.repo,
                    "number": pr_number,
                }
            }))
            .await?;

        if let Some(errors) = response.errors
            && !errors.is_empty()
        {
            let messages: Vec<_> = errors.into_iter().map(|e| e.message).collect();
            return Err(Error::GitHubApi(format!(
                "GraphQL error: {}",
                messages.join(", ")
            )));
        }

        let decision = response
            .data
            .and_then(|d| d.repository)
            .and_then(|r| r.pull_request)
            .ok_or(Error::PrNotFound(pr_number))?
            .review_decision;

        Ok(match decision.as_deref() {
            Some("APPROVED") => ReviewDecision::Approved,
            Some("CHANGES_REQUESTED") => ReviewDecision::ChangesRequested,
            Some("REVIEW_REQUIRED") => ReviewDecision::ReviewRequired,
            _ => ReviewDecision::None,
        })
    }
}

fn state_from_octocrab(pr: &octocrab::models::pulls::PullRequest) -> PrState {
    match pr.state {
        Some(octocrab::models::IssueState::Open) => PrState::Open,
        _ if pr.merged_at.is_some() => PrState::Merged,
        // IssueState is non-exhaustive
        Some(_) | None => PrState::Closed,
    }
}

fn pr_from_octocrab(pr: &octocrab::models::pulls::PullRequest) -> PullRequest {
    PullRequest {
        number: pr.number,
        html_url: pr
            .html_url
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        base_ref: pr.base.ref_field.clone(),
        head_ref: pr.head.ref_field.clone(),
        title: pr.title.as_deref().unwrap_or_default().to_string(),
        state: state_from_octocrab(pr),
    }
}

#[async_trait]
impl HostService for GitHubService {
    async fn find_pr_by_branch(&self, branch: &str) -> Result<Option<PullRequest>> {
        debug!(branch, "finding PR for branch");
        let head = format!("{}:{}", &self.config.owner, branch);

        let prs = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .list()
            .head(head)
            .state(octocrab::params::State::All)
            .sort(octocrab::params::pulls::Sort::Created)
            .direction(octocrab::params::Direction::Descending)
            .send()
            .await?;

        let converted: Vec<PullRequest> = prs.items.iter().map(pr_from_octocrab).collect();
        // An open PR wins over older closed/merged ones for the same branch
        let result = converted
            .iter()
            .find(|pr| pr.state == PrState::Open)
            .or_else(|| converted.first())
            .cloned();

        debug!(branch, pr_number = ?result.as_ref().map(|pr| pr.number), "PR lookup done");
        Ok(result)
    }

    async fn create_pr(
        &self,
        title: &str,
        head: &str,
        base: &str,
        body: Option<&str>,
    ) -> Result<PullRequest> {
        debug!(head, base, "creating PR");
        let pulls = self.client.pulls(&self.config.owner, &self.config.repo);
        let request = pulls.create(title, head, base);
        let request = match body {
            Some(body) => request.body(body),
            None => request,
        };

        let pr = pr_from_octocrab(&request.send().await?);
        info!(pr_number = pr.number, head, base, "opened PR");
        Ok(pr)
    }

    async fn get_merge_status(&self, pr_number: u64) -> Result<MergeStatus> {
        debug!(pr_number, "getting merge status");
        let pr = self.get_raw_pr(pr_number).await?;

        let checks = self.check_ci_status(&pr.head.sha).await?;
        let review_decision = self.review_decision(pr_number).await?;

        debug!(pr_number, ?checks, ?review_decision, "got merge status");
        Ok(MergeStatus {
            checks,
            review_decision,
        })
    }

    async fn get_base_branch(&self, pr_number: u64) -> Result<String> {
        let pr = self.get_raw_pr(pr_number).await?;
        debug!(pr_number, base = %pr.base.ref_field, "got base branch");
        Ok(pr.base.ref_field)
    }

    async fn retarget_pr(&self, pr_number: u64, new_base: &str) -> Result<()> {
        debug!(pr_number, new_base, "retargeting PR");
        self.client
            .pulls(&self.config.owner, &self.config.repo)
            .update(pr_number)
            .base(new_base)
            .send()
            .await?;
        debug!(pr_number, "retargeted PR");
        Ok(())
    }

    async fn get_state(&self, pr_number: u64) -> Result<PrState> {
        let pr = self.get_raw_pr(pr_number).await?;
        let state = state_from_octocrab(&pr);
        debug!(pr_number, %state, "got PR state");
        Ok(state)
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
