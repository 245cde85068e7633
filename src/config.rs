//! Run configuration
//!
//! Read once at startup from the process environment (after `.env` has been
//! loaded) and passed by reference to every component.

use crate::error::{Error, Result};
use crate::poll::PollSettings;
use crate::stages::select_stages;
use crate::types::{EnvironmentStage, PlatformConfig};
use std::env;
use std::time::Duration;

/// Default GitHub API endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default seconds between resolution polls
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Immutable configuration for one run
#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer token for the hosting provider
    pub token: String,
    /// Repository owner
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// API base URL
    pub api_url: String,
    /// Reviewers requested on every PR
    pub reviewers: Vec<String>,
    /// Stages to run, in order
    pub stages: Vec<EnvironmentStage>,
    /// Polling behavior for conflict resolution and merge gates
    pub poll: PollSettings,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let token = get("GITHUB_TOKEN")
            .ok_or_else(|| Error::Config("GITHUB_TOKEN is not set".to_string()))?;

        let repo_spec = get("GITHUB_REPO")
            .ok_or_else(|| Error::Config("GITHUB_REPO is not set".to_string()))?;
        let (owner, repo) = parse_repo(&repo_spec)?;

        let api_url = match get("GITHUB_API_URL") {
            Some(raw) => parse_api_url(&raw)?,
            None => DEFAULT_API_URL.to_string(),
        };

        let reviewers = get("PR_REVIEWERS")
            .map(|raw| split_list(&raw))
            .unwrap_or_default();

        let env_keys = get("PR_ENVS").map(|raw| split_list(&raw));
        let stages = select_stages(env_keys.as_deref())?;

        let interval_secs = match get("PR_POLL_INTERVAL_SECS") {
            Some(raw) => parse_secs("PR_POLL_INTERVAL_SECS", &raw)?,
            None => DEFAULT_POLL_INTERVAL_SECS,
        };
        if interval_secs == 0 {
            return Err(Error::Config(
                "PR_POLL_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        let max_wait = match get("PR_RESOLUTION_TIMEOUT_SECS") {
            Some(raw) => match parse_secs("PR_RESOLUTION_TIMEOUT_SECS", &raw)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            None => None,
        };

        Ok(Self {
            token,
            owner,
            repo,
            api_url,
            reviewers,
            stages,
            poll: PollSettings {
                interval: Duration::from_secs(interval_secs),
                max_wait,
            },
        })
    }

    /// Platform configuration for the pull request service
    pub fn platform(&self) -> PlatformConfig {
        PlatformConfig {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            api_url: self.api_url.clone(),
        }
    }

    /// `owner/name`
    pub fn repo_spec(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

fn parse_repo(spec: &str) -> Result<(String, String)> {
    let invalid = || Error::Config(format!("GITHUB_REPO must be 'owner/repo', got '{spec}'"));

    let (owner, repo) = spec.split_once('/').ok_or_else(invalid)?;
    let (owner, repo) = (owner.trim(), repo.trim().trim_end_matches(".git"));
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return Err(invalid());
    }
    Ok((owner.to_string(), repo.to_string()))
}

fn parse_api_url(raw: &str) -> Result<String> {
    let url = url::Url::parse(raw)
        .map_err(|e| Error::Config(format!("GITHUB_API_URL '{raw}' is not a valid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "GITHUB_API_URL must use http or https, got '{}'",
            url.scheme()
        )));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

fn parse_secs(key: &str, raw: &str) -> Result<u64> {
    raw.parse()
        .map_err(|_| Error::Config(format!("{key} must be a whole number of seconds, got '{raw}'")))
}

/// Split a comma-separated list, trimming entries and dropping blanks and repeats
fn split_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !out.iter().any(|seen| seen == item) {
            out.push(item.to_string());
        }
    }
    out
}
