//! Phase 3: Promotion execution
//!
//! Runs the plan stage by stage: staging branch, merge or cherry-pick,
//! conflict handling, push, pull request. A fatal error stops the run; stages
//! after it are reported as not attempted.

use crate::conflict::{ConflictHandler, Resolution};
use crate::error::{AbandonReason, ApiFailure, Error, Result};
use crate::git::{
    ApplyResult, GitOperations, InProgress, apply_change, change_present, create_staging_branch,
    remote_ref,
};
use crate::platform::PullRequestService;
use crate::poll::{Clock, Interrupt, PollOutcome, PollSettings, poll_until};
use crate::promote::body::{BodyContext, RelatedPr, render_pr_body};
use crate::promote::{ChangeStatus, Phase, ProgressCallback, PromotionPlan, StagePlan};
use crate::types::{
    ConflictReport, EnvironmentStage, PrState, PromotionMode, PullRequest, PullRequestDescriptor,
    StagingBranch,
};
use chrono::Local;
use tracing::{debug, warn};

/// When the next stage's staging branch may be cut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageGate {
    /// Right after the previous stage's PR is open
    #[default]
    Immediate,
    /// Only once the previous stage's PR has merged
    AfterMerge,
}

/// Collaborators and policies for one run
pub struct ExecutionContext<'a> {
    /// Local repository
    pub git: &'a dyn GitOperations,
    /// Hosting provider
    pub platform: &'a dyn PullRequestService,
    /// Progress sink
    pub progress: &'a dyn ProgressCallback,
    /// Time source for waits
    pub clock: &'a dyn Clock,
    /// Cancellation source for waits
    pub interrupt: &'a dyn Interrupt,
    /// Poll interval and deadline for waits
    pub poll: PollSettings,
    /// Stage gate policy
    pub gate: StageGate,
}

/// How a stage ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// A new PR was opened
    Opened,
    /// An already open PR was reused
    Reused,
    /// Dry run: nothing was done
    Planned,
    /// The target branch already holds the staging branch; no PR needed
    AlreadyPromoted,
    /// Stopped by a fatal error
    Failed,
    /// The user gave up waiting
    Abandoned,
    /// Not reached because an earlier stage stopped the run
    NotAttempted,
}

/// Outcome of one stage
#[derive(Debug, Clone)]
pub struct StageReport {
    /// Stage
    pub stage: EnvironmentStage,
    /// Staging branch name
    pub staging_branch: String,
    /// How the stage ended
    pub status: StageStatus,
    /// PR for the stage, if one is open
    pub pr: Option<PullRequest>,
    /// Revisions applied by the tool
    pub applied: Vec<String>,
    /// Revisions already present or empty
    pub skipped: Vec<String>,
    /// Revisions applied by hand after a conflict
    pub resolved: Vec<String>,
}

impl StageReport {
    fn new(step: &StagePlan, status: StageStatus) -> Self {
        Self {
            stage: step.stage.clone(),
            staging_branch: step.staging_branch.clone(),
            status,
            pr: None,
            applied: Vec::new(),
            skipped: Vec::new(),
            resolved: Vec::new(),
        }
    }
}

/// Result of promotion execution
#[derive(Debug)]
pub struct PromotionResult {
    /// One report per planned stage, in order
    pub stages: Vec<StageReport>,
    /// Error that stopped the run
    pub failure: Option<Error>,
    /// Non-fatal problems (reviewer attachment)
    pub warnings: Vec<String>,
}

impl PromotionResult {
    /// Every stage completed
    pub const fn success(&self) -> bool {
        self.failure.is_none()
    }

    /// PRs opened or reused, in stage order
    pub fn pull_requests(&self) -> impl Iterator<Item = &PullRequest> {
        self.stages.iter().filter_map(|s| s.pr.as_ref())
    }
}

/// Execute a promotion plan
///
/// Only fatal errors are recorded in [`PromotionResult::failure`]; errors
/// returned directly are unexpected internal failures.
pub async fn execute_promotion(
    plan: &PromotionPlan,
    ctx: &ExecutionContext<'_>,
    dry_run: bool,
) -> Result<PromotionResult> {
    let mut result = PromotionResult {
        stages: Vec::with_capacity(plan.steps.len()),
        failure: None,
        warnings: Vec::new(),
    };

    if dry_run {
        ctx.progress
            .on_message("Dry run - no changes will be made")
            .await;
        report_dry_run(plan, ctx).await;
        result.stages = plan
            .steps
            .iter()
            .map(|s| StageReport::new(s, StageStatus::Planned))
            .collect();
        return Ok(result);
    }

    ctx.progress.on_phase(Phase::Promoting).await;

    let total = plan.steps.len();
    let mut related: Vec<RelatedPr> = Vec::new();

    for (index, step) in plan.steps.iter().enumerate() {
        ctx.progress
            .on_stage_started(index, total, &step.stage)
            .await;

        let gate = match result.stages.last() {
            _ if ctx.interrupt.is_interrupted() => Err(interrupted(step)),
            Some(previous) if ctx.gate == StageGate::AfterMerge => {
                wait_for_merge(ctx, previous, &step.stage).await
            }
            _ => Ok(()),
        };
        if let Err(e) = gate {
            let report = StageReport::new(step, status_for(&e));
            fail_run(&mut result, plan, index, report, e);
            return Ok(result);
        }

        let mut report = StageReport::new(step, StageStatus::Failed);
        match run_stage(plan, step, index, &related, ctx, &mut report, &mut result.warnings).await {
            Ok(status) => {
                report.status = status;
                if let Some(pr) = &report.pr {
                    related.push(RelatedPr {
                        stage: step.stage.name.clone(),
                        number: pr.number,
                    });
                }
                result.stages.push(report);
            }
            Err(e) => {
                report.status = status_for(&e);
                fail_run(&mut result, plan, index, report, e);
                return Ok(result);
            }
        }
    }

    ctx.progress.on_phase(Phase::Complete).await;
    Ok(result)
}

const fn status_for(error: &Error) -> StageStatus {
    match error {
        Error::Abandoned { .. } => StageStatus::Abandoned,
        _ => StageStatus::Failed,
    }
}

/// Record the failing stage, mark the rest as not attempted
fn fail_run(
    result: &mut PromotionResult,
    plan: &PromotionPlan,
    index: usize,
    report: StageReport,
    error: Error,
) {
    warn!(stage = %report.stage.name, error = %error, "stage failed, stopping run");
    result.stages.push(report);
    for step in plan.steps.iter().skip(index + 1) {
        result
            .stages
            .push(StageReport::new(step, StageStatus::NotAttempted));
    }
    result.failure = Some(error);
}

/// The user pressed Ctrl-C between waits
fn interrupted(step: &StagePlan) -> Error {
    Error::Abandoned {
        stage: step.stage.name.clone(),
        branch: step.staging_branch.clone(),
        reason: AbandonReason::Interrupted,
    }
}

/// Run one stage; returns how it ended
async fn run_stage(
    plan: &PromotionPlan,
    step: &StagePlan,
    index: usize,
    related: &[RelatedPr],
    ctx: &ExecutionContext<'_>,
    report: &mut StageReport,
    warnings: &mut Vec<String>,
) -> Result<StageStatus> {
    let git = ctx.git;
    let staging = create_staging_branch(git, &step.stage, &step.staging_branch).await?;
    ctx.progress.on_branch_ready(&staging).await;

    let mut handler = ConflictHandler::new(git, ctx.clock, ctx.interrupt, ctx.poll);

    if staging.resumed {
        if let Some(op) = git.in_progress().await? {
            debug!(branch = %staging.name, %op, "resuming unfinished operation");
            let conflict = unfinished_conflict(git, &staging, plan, op).await?;
            // A change the user dropped is applied again below
            resolve(&mut handler, conflict, &staging, ctx, report).await?;
        }
    }

    apply_all(&mut handler, &staging, plan, ctx, report).await?;

    // An earlier run's PR for this stage may have merged since
    let target = remote_ref(git, &step.stage.target_branch);
    git.fetch_branch(&step.stage.target_branch).await?;
    if git.is_ancestor("HEAD", &target).await? {
        debug!(branch = %staging.name, %target, "staging branch already merged");
        ctx.progress
            .on_message(&format!(
                "{} is already on {target}, nothing to promote",
                staging.name
            ))
            .await;
        return Ok(StageStatus::AlreadyPromoted);
    }

    git.push(&staging.name).await.map_err(|e| Error::Push {
        stage: step.stage.name.clone(),
        branch: staging.name.clone(),
        message: e.to_string(),
    })?;
    ctx.progress.on_pushed(&staging.name).await;

    if ctx.interrupt.is_interrupted() {
        return Err(interrupted(step));
    }

    let reused = publish(plan, step, index, related, ctx, report, warnings).await?;
    Ok(if reused {
        StageStatus::Reused
    } else {
        StageStatus::Opened
    })
}

/// Apply every change, entering the conflict handler once per conflict
async fn apply_all(
    handler: &mut ConflictHandler<'_>,
    staging: &StagingBranch,
    plan: &PromotionPlan,
    ctx: &ExecutionContext<'_>,
    report: &mut StageReport,
) -> Result<()> {
    let mut pending = plan.request.clone();
    loop {
        match apply_change(ctx.git, staging, &pending).await? {
            ApplyResult::Complete { applied, skipped } => {
                record_changes(ctx, report, applied, skipped).await;
                return Ok(());
            }
            ApplyResult::Conflict {
                report: conflict,
                applied,
                skipped,
            } => {
                record_changes(ctx, report, applied, skipped).await;
                let rev = conflict.rev.clone();
                if !resolve(handler, conflict, staging, ctx, report).await? {
                    continue;
                }
                // Everything up to the conflict is on the branch now
                match pending.remaining_after(&rev) {
                    Some(rest) => pending = rest,
                    None => return Ok(()),
                }
            }
        }
    }
}

async fn record_changes(
    ctx: &ExecutionContext<'_>,
    report: &mut StageReport,
    applied: Vec<String>,
    skipped: Vec<String>,
) {
    // A pass after a conflict sees this stage's own changes as present
    let skipped: Vec<String> = skipped
        .into_iter()
        .filter(|rev| !report.applied.contains(rev) && !report.resolved.contains(rev))
        .collect();
    for rev in &applied {
        ctx.progress.on_change(rev, ChangeStatus::Applied).await;
    }
    for rev in &skipped {
        ctx.progress.on_change(rev, ChangeStatus::Skipped).await;
    }
    report.applied.extend(applied);
    report.skipped.extend(skipped);
}

/// Hand a conflict to the handler; abandonment becomes a fatal error
///
/// Returns whether the conflicting change ended up on the branch. A resolution
/// that aborted the merge or cherry-pick instead of committing it returns
/// false so the change is applied again.
async fn resolve(
    handler: &mut ConflictHandler<'_>,
    conflict: ConflictReport,
    staging: &StagingBranch,
    ctx: &ExecutionContext<'_>,
    report: &mut StageReport,
) -> Result<bool> {
    let rev = conflict.rev.clone();
    let mode = conflict.mode;
    let stage = conflict.stage.name.clone();
    let branch = conflict.staging_branch.clone();

    match handler.handle(conflict, ctx.progress).await? {
        Resolution::Resolved => {
            if !change_present(ctx.git, staging, mode, &rev).await? {
                warn!(%rev, %branch, "resolved branch is missing the change");
                ctx.progress
                    .on_message(&format!(
                        "{rev} is not on {branch} after the resolution, applying it again"
                    ))
                    .await;
                return Ok(false);
            }
            ctx.progress.on_change(&rev, ChangeStatus::Resolved).await;
            report.resolved.push(rev);
            Ok(true)
        }
        Resolution::Abandoned(reason) => Err(Error::Abandoned {
            stage,
            branch,
            reason,
        }),
    }
}

/// Conflict report for a merge or cherry-pick left unfinished by an earlier run
async fn unfinished_conflict(
    git: &dyn GitOperations,
    staging: &StagingBranch,
    plan: &PromotionPlan,
    op: InProgress,
) -> Result<ConflictReport> {
    let (mode, rev) = match op {
        InProgress::Merge => (
            PromotionMode::MergeBranch,
            remote_ref(git, plan.request.source_ref()),
        ),
        InProgress::CherryPick => {
            let head = git.resolve_commit("CHERRY_PICK_HEAD").await?.unwrap_or_default();
            (PromotionMode::CherryPick, head)
        }
    };

    Ok(ConflictReport {
        stage: staging.stage.clone(),
        staging_branch: staging.name.clone(),
        rev,
        mode,
        conflicting_files: git.conflicting_files().await?,
        raw_tool_output: String::new(),
    })
}

/// Open (or reuse) the stage's PR and request reviewers
async fn publish(
    plan: &PromotionPlan,
    step: &StagePlan,
    index: usize,
    related: &[RelatedPr],
    ctx: &ExecutionContext<'_>,
    report: &mut StageReport,
    warnings: &mut Vec<String>,
) -> Result<bool> {
    let head = step.staging_branch.as_str();
    let base = step.stage.target_branch.as_str();
    let publish_error = |e: Error| Error::Publish {
        stage: step.stage.name.clone(),
        head: head.to_string(),
        base: base.to_string(),
        kind: e.api_failure().unwrap_or(ApiFailure::Other),
        message: e.to_string(),
    };

    let existing = ctx
        .platform
        .find_open_pr(head, base)
        .await
        .map_err(publish_error)?;

    let (pr, reused) = if let Some(pr) = existing {
        debug!(pr_number = pr.number, "reusing open PR");
        (pr, true)
    } else {
        let changes = change_lines(plan, step, ctx.git).await;
        let body = render_pr_body(&BodyContext {
            source_ref: plan.request.source_ref(),
            changes: &changes,
            related,
            stages: &plan.steps.iter().map(|s| s.stage.clone()).collect::<Vec<_>>(),
            index,
            created_at: Local::now(),
        });
        let descriptor = PullRequestDescriptor {
            head: head.to_string(),
            base: base.to_string(),
            title: step.title.clone(),
            body,
            reviewers: plan.reviewers.clone(),
        };
        let pr = ctx
            .platform
            .create_pr(&descriptor)
            .await
            .map_err(publish_error)?;
        (pr, false)
    };

    ctx.progress.on_pr_ready(&step.stage, &pr, reused).await;

    if let Err(e) = ctx
        .platform
        .request_reviewers(pr.number, &plan.reviewers)
        .await
    {
        let warning = Error::ReviewerAttachment(format!("PR #{}: {e}", pr.number));
        warn!(pr_number = pr.number, error = %e, "reviewer attachment failed");
        ctx.progress.on_error(&warning).await;
        warnings.push(warning.to_string());
    }

    report.pr = Some(pr);
    Ok(reused)
}

/// Lines for the body's change list
async fn change_lines(plan: &PromotionPlan, step: &StagePlan, git: &dyn GitOperations) -> Vec<String> {
    if !plan.commits.is_empty() {
        return plan
            .commits
            .iter()
            .map(|c| format!("{} - {}", c.short_id(), c.subject))
            .collect();
    }

    let base = remote_ref(git, &step.stage.target_branch);
    let head = remote_ref(git, plan.request.source_ref());
    match git.log_subjects(&base, &head).await {
        Ok(subjects) => subjects,
        Err(e) => {
            debug!(error = %e, "could not list commits for PR body");
            Vec::new()
        }
    }
}

/// Block until the previous stage's PR merges
async fn wait_for_merge(
    ctx: &ExecutionContext<'_>,
    previous: &StageReport,
    next: &EnvironmentStage,
) -> Result<()> {
    let Some(pr) = previous.pr.as_ref() else {
        return Ok(());
    };

    ctx.progress.on_waiting_for_merge(&previous.stage, pr).await;

    let platform = ctx.platform;
    let number = pr.number;
    let outcome = poll_until(ctx.poll, ctx.clock, ctx.interrupt, move || async move {
        match platform.pull_request_state(number).await? {
            PrState::Open => Ok(None),
            state => Ok(Some(state)),
        }
    })
    .await?;

    let abandoned = |reason: AbandonReason| Error::Abandoned {
        stage: previous.stage.name.clone(),
        branch: previous.staging_branch.clone(),
        reason,
    };

    match outcome {
        PollOutcome::Ready(PrState::Merged) => Ok(()),
        PollOutcome::Ready(_) => Err(Error::Gate {
            stage: next.name.clone(),
            message: format!(
                "{} PR #{number} was closed without merging",
                previous.stage.name
            ),
        }),
        PollOutcome::TimedOut => Err(abandoned(AbandonReason::TimedOut)),
        PollOutcome::Interrupted => Err(abandoned(AbandonReason::Interrupted)),
    }
}

/// Report what would be done in a dry run
async fn report_dry_run(plan: &PromotionPlan, ctx: &ExecutionContext<'_>) {
    let git = ctx.git;
    let source = remote_ref(git, plan.request.source_ref());

    for step in &plan.steps {
        let target = remote_ref(git, &step.stage.target_branch);
        ctx.progress
            .on_message(&format!("{}:", step.stage.name))
            .await;
        ctx.progress
            .on_message(&format!(
                "  Would create {} from {target}",
                step.staging_branch
            ))
            .await;
        match plan.request.mode() {
            PromotionMode::MergeBranch => {
                ctx.progress
                    .on_message(&format!("  Would merge {source}"))
                    .await;
            }
            PromotionMode::CherryPick => {
                for commit in &plan.commits {
                    ctx.progress
                        .on_message(&format!(
                            "  Would cherry-pick {} {}",
                            commit.short_id(),
                            commit.subject
                        ))
                        .await;
                }
            }
        }
        ctx.progress
            .on_message(&format!(
                "  Would open PR {} → {} ({})",
                step.staging_branch, step.stage.target_branch, step.title
            ))
            .await;
    }

    if !plan.reviewers.is_empty() {
        ctx.progress
            .on_message(&format!("Reviewers: {}", plan.reviewers.join(", ")))
            .await;
    }
}
