//! GitHub pull request service

use crate::error::{ApiFailure, Error, Result};
use crate::platform::PullRequestService;
use crate::types::{PlatformConfig, PrState, PullRequest, PullRequestDescriptor};
use async_trait::async_trait;
use octocrab::Octocrab;
use octocrab::models::IssueState;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

const USER_AGENT: &str = concat!("pr-promote/", env!("CARGO_PKG_VERSION"));

/// GitHub service using octocrab, with raw requests where octocrab falls short
pub struct GitHubService {
    client: Octocrab,
    config: PlatformConfig,
    token: String,
    http_client: Client,
}

impl GitHubService {
    /// Create a new GitHub service against `api_url`
    pub fn new(token: &str, owner: String, repo: String, api_url: String) -> Result<Self> {
        let api_url = api_url.trim_end_matches('/').to_string();
        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .base_uri(api_url.as_str())
            .map_err(|e| Error::Config(format!("invalid GitHub API URL '{api_url}': {e}")))?
            .build()
            .map_err(|e| Error::Internal(format!("failed to build GitHub client: {e}")))?;

        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: PlatformConfig {
                owner,
                repo,
                api_url,
            },
            token: token.to_string(),
            http_client,
        })
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
    }
}

#[derive(Serialize)]
struct ReviewersRequest<'a> {
    reviewers: &'a [String],
}

#[async_trait]
impl PullRequestService for GitHubService {
    async fn find_open_pr(&self, head: &str, base: &str) -> Result<Option<PullRequest>> {
        debug!(head, base, "finding open PR");
        let prs = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .list()
            .head(format!("{}:{head}", self.config.owner))
            .base(base)
            .state(octocrab::params::State::Open)
            .send()
            .await?;

        let result = prs.items.first().map(pr_from_octocrab);
        match &result {
            Some(pr) => debug!(pr_number = pr.number, "found open PR"),
            None => debug!("no open PR found"),
        }
        Ok(result)
    }

    async fn create_pr(&self, descriptor: &PullRequestDescriptor) -> Result<PullRequest> {
        debug!(head = %descriptor.head, base = %descriptor.base, "creating PR");
        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .create(&descriptor.title, &descriptor.head, &descriptor.base)
            .body(&descriptor.body)
            .send()
            .await?;

        let result = pr_from_octocrab(&pr);
        debug!(pr_number = result.number, "created PR");
        Ok(result)
    }

    async fn request_reviewers(&self, pr_number: u64, reviewers: &[String]) -> Result<()> {
        if reviewers.is_empty() {
            return Ok(());
        }
        debug!(pr_number, ?reviewers, "requesting reviewers");

        let url = format!(
            "{}/repos/{}/{}/pulls/{pr_number}/requested_reviewers",
            self.config.api_url, self.config.owner, self.config.repo
        );

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .json(&ReviewersRequest { reviewers })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(pr_number, "reviewers requested");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        debug!(%status, %body, "reviewer request rejected");
        Err(Error::Api {
            kind: ApiFailure::from_status(status.as_u16(), &body),
            message: format!("{status}: {body}"),
        })
    }

    async fn pull_request_state(&self, pr_number: u64) -> Result<PrState> {
        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .get(pr_number)
            .await?;

        let state = if pr.merged_at.is_some() {
            PrState::Merged
        } else if matches!(pr.state, Some(IssueState::Closed)) {
            PrState::Closed
        } else {
            PrState::Open
        };
        debug!(pr_number, ?state, "fetched PR state");
        Ok(state)
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
