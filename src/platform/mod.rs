//! Pull request hosting
//!
//! [`PullRequestService`] is what the promotion engine needs from the hosting
//! provider. [`GitHubService`] talks to the GitHub REST API.

mod github;

pub use github::GitHubService;

use crate::error::Result;
use crate::types::{PlatformConfig, PrState, PullRequest, PullRequestDescriptor};
use async_trait::async_trait;

/// Pull request operations on the hosting provider
#[async_trait]
pub trait PullRequestService: Send + Sync {
    /// Find an open PR from `head` into `base`
    async fn find_open_pr(&self, head: &str, base: &str) -> Result<Option<PullRequest>>;

    /// Open a new PR; reviewers are attached separately
    async fn create_pr(&self, descriptor: &PullRequestDescriptor) -> Result<PullRequest>;

    /// Request reviews on an existing PR
    async fn request_reviewers(&self, pr_number: u64, reviewers: &[String]) -> Result<()>;

    /// Current state of a PR
    async fn pull_request_state(&self, pr_number: u64) -> Result<PrState>;

    /// Repository this service operates on
    fn config(&self) -> &PlatformConfig;
}
