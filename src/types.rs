//! Core types for pr-promote

use std::collections::BTreeSet;
use std::fmt;

/// One step of the promotion sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentStage {
    /// Display name (e.g. "Quality")
    pub name: String,
    /// Key used by `PR_ENVS` to select the stage
    pub key: String,
    /// Branch the stage promotes into
    pub target_branch: String,
    /// Suffix appended to the staging branch name
    pub staging_suffix: String,
    /// Prefix of the pull request title
    pub pr_title_prefix: String,
}

impl EnvironmentStage {
    /// Whether this stage deploys to production
    pub fn is_production(&self) -> bool {
        self.key == "main"
    }
}

/// How the change reaches each staging branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionMode {
    /// Merge the whole source branch
    MergeBranch,
    /// Apply an ordered list of commits
    CherryPick,
}

impl fmt::Display for PromotionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MergeBranch => f.write_str("Merge"),
            Self::CherryPick => f.write_str("Cherry-Pick"),
        }
    }
}

/// What to promote, built once from CLI input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionRequest {
    source_ref: String,
    commits: Vec<String>,
}

impl PromotionRequest {
    /// Promote the whole source branch
    pub fn merge(source_ref: impl Into<String>) -> Self {
        Self {
            source_ref: source_ref.into(),
            commits: Vec::new(),
        }
    }

    /// Promote the given commits, in order
    pub fn cherry_pick(source_ref: impl Into<String>, commits: Vec<String>) -> Self {
        Self {
            source_ref: source_ref.into(),
            commits,
        }
    }

    /// Source branch (or change identifier)
    pub fn source_ref(&self) -> &str {
        &self.source_ref
    }

    /// Promotion mode; cherry-pick iff commits were given
    pub fn mode(&self) -> PromotionMode {
        if self.commits.is_empty() {
            PromotionMode::MergeBranch
        } else {
            PromotionMode::CherryPick
        }
    }

    /// Commits to cherry-pick (empty in merge mode)
    pub fn commits(&self) -> &[String] {
        &self.commits
    }

    /// The request left to apply once `rev` has been resolved by hand
    ///
    /// `None` when nothing follows `rev` (always the case for a merge).
    pub fn remaining_after(&self, rev: &str) -> Option<Self> {
        let pos = self.commits.iter().position(|c| c == rev)?;
        let rest = &self.commits[pos + 1..];
        (!rest.is_empty()).then(|| Self::cherry_pick(self.source_ref.clone(), rest.to_vec()))
    }
}

/// A staging branch prepared for one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingBranch {
    /// Branch name
    pub name: String,
    /// Stage the branch belongs to
    pub stage: EnvironmentStage,
    /// Branch already existed (left by an earlier run) and was reused as-is
    pub resumed: bool,
}

/// Details of a failed merge or cherry-pick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictReport {
    /// Stage being promoted
    pub stage: EnvironmentStage,
    /// Staging branch holding the conflict
    pub staging_branch: String,
    /// Commit that conflicted (cherry-pick) or the merged ref (merge)
    pub rev: String,
    /// Operation that stopped
    pub mode: PromotionMode,
    /// Paths with unresolved conflicts
    pub conflicting_files: BTreeSet<String>,
    /// Combined stdout/stderr of the failing git command
    pub raw_tool_output: String,
}

/// Request sent to the hosting provider to open a PR
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestDescriptor {
    /// Head (staging) branch
    pub head: String,
    /// Base (target) branch
    pub base: String,
    /// PR title
    pub title: String,
    /// PR body (markdown)
    pub body: String,
    /// Reviewers to request
    pub reviewers: Vec<String>,
}

/// A pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    /// PR number
    pub number: u64,
    /// Web URL for the PR
    pub html_url: String,
    /// Base branch name
    pub base_ref: String,
    /// Head branch name
    pub head_ref: String,
    /// PR title
    pub title: String,
}

/// Lifecycle state of a PR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrState {
    /// Open, not merged
    Open,
    /// Merged into its base
    Merged,
    /// Closed without merging
    Closed,
}

/// Repository on the hosting provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// API base URL (`https://api.github.com` or an Enterprise `/api/v3` URL)
    pub api_url: String,
}
