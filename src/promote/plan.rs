//! Phase 2: Promotion planning
//!
//! Fixes the staging branch and PR title for every stage up front, so a dry
//! run and a real run agree on names.

use crate::error::Result;
use crate::git::staging_branch_name;
use crate::promote::validate::CommitInfo;
use crate::stages::validate_stages;
use crate::types::{EnvironmentStage, PromotionRequest};

/// One stage of the plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    /// Stage to promote into
    pub stage: EnvironmentStage,
    /// Staging branch for the stage
    pub staging_branch: String,
    /// PR title
    pub title: String,
}

/// Promotion plan
#[derive(Debug, Clone)]
pub struct PromotionPlan {
    /// What is promoted, with cherry-picks pinned to full commit ids
    pub request: PromotionRequest,
    /// Stages in promotion order
    pub steps: Vec<StagePlan>,
    /// Reviewers requested on every PR
    pub reviewers: Vec<String>,
    /// Cherry-pick commits with subjects (empty for a merge)
    pub commits: Vec<CommitInfo>,
}

/// PR title for a stage: `<prefix>: <source>`
pub fn pr_title(stage: &EnvironmentStage, source_ref: &str) -> String {
    format!("{}: {source_ref}", stage.pr_title_prefix)
}

/// Create a promotion plan
pub fn create_promotion_plan(
    request: &PromotionRequest,
    stages: &[EnvironmentStage],
    reviewers: &[String],
    commits: Vec<CommitInfo>,
) -> Result<PromotionPlan> {
    validate_stages(stages)?;

    let steps = stages
        .iter()
        .map(|stage| StagePlan {
            stage: stage.clone(),
            staging_branch: staging_branch_name(request.source_ref(), &stage.staging_suffix),
            title: pr_title(stage, request.source_ref()),
        })
        .collect();

    // Pin cherry-picks to resolved ids; relative revisions would move with HEAD
    let request = if commits.is_empty() {
        request.clone()
    } else {
        PromotionRequest::cherry_pick(
            request.source_ref(),
            commits.iter().map(|c| c.id.clone()).collect(),
        )
    };

    Ok(PromotionPlan {
        request,
        steps,
        reviewers: reviewers.to_vec(),
        commits,
    })
}
