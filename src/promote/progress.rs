//! Progress callback trait for interface-agnostic updates
//!
//! The engine never prints. Front ends implement [`ProgressCallback`] to
//! render stage, conflict and pull request events.

use crate::error::Error;
use crate::git::ResolutionStatus;
use crate::types::{ConflictReport, EnvironmentStage, PullRequest, StagingBranch};
use async_trait::async_trait;

/// Promotion phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Checking the repository and request
    Validating,
    /// Building the per-stage plan
    Planning,
    /// Running stages
    Promoting,
    /// All stages processed
    Complete,
}

/// What happened to one change on a staging branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    /// New commit created
    Applied,
    /// Already on the branch, or empty
    Skipped,
    /// Applied by hand after a conflict
    Resolved,
}

/// Progress callback trait
///
/// Implement this trait to receive progress updates during promotion.
#[async_trait]
pub trait ProgressCallback: Send + Sync {
    /// Called when entering a new phase
    async fn on_phase(&self, phase: Phase);

    /// Called before a stage starts (`index` is zero-based)
    async fn on_stage_started(&self, index: usize, total: usize, stage: &EnvironmentStage);

    /// Called once the staging branch is checked out
    async fn on_branch_ready(&self, branch: &StagingBranch);

    /// Called for each merged or cherry-picked change
    async fn on_change(&self, rev: &str, status: ChangeStatus);

    /// Called when a conflict stops the stage, with resolution steps
    async fn on_conflict(&self, report: &ConflictReport, steps: &[String]);

    /// Called while waiting, whenever the reason the branch is not ready changes
    async fn on_resolution_pending(&self, status: &ResolutionStatus);

    /// Called when a conflict has been resolved and pushed
    async fn on_conflict_resolved(&self, report: &ConflictReport);

    /// Called after the staging branch is pushed
    async fn on_pushed(&self, branch: &str);

    /// Called when a PR is opened, or an open one is reused
    async fn on_pr_ready(&self, stage: &EnvironmentStage, pr: &PullRequest, reused: bool);

    /// Called before waiting for the previous stage's PR to merge
    async fn on_waiting_for_merge(&self, stage: &EnvironmentStage, pr: &PullRequest);

    /// Called when a non-fatal error occurs
    async fn on_error(&self, error: &Error);

    /// Called with a general status message
    async fn on_message(&self, message: &str);
}
