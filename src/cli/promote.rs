//! Promote command - carry a change through every environment stage

use crate::cli::progress::CliProgress;
use crate::cli::style::{Stream, Stylize, arrow, check, cross, hyperlink_url, warning};
use anstream::{eprintln, println};
use dialoguer::Confirm;
use pr_promote::config::Config;
use pr_promote::error::{Error, Result};
use pr_promote::git::GitCli;
use pr_promote::platform::GitHubService;
use pr_promote::poll::{CtrlC, TokioClock};
use pr_promote::promote::{
    ExecutionContext, Phase, ProgressCallback, PromotionPlan, PromotionResult,
    StageGate, StageStatus, create_promotion_plan, execute_promotion, validate_prerequisites,
};
use pr_promote::types::PromotionRequest;
use std::path::PathBuf;

/// Options for the promote command
#[derive(Debug, Clone)]
pub struct PromoteOptions {
    /// Repository path
    pub path: PathBuf,
    /// Source branch
    pub source: String,
    /// Commits to cherry-pick (empty merges the whole branch)
    pub cherry_pick: Vec<String>,
    /// Git remote
    pub remote: String,
    /// Report the plan only
    pub dry_run: bool,
    /// Preview and ask before running
    pub confirm: bool,
    /// Wait for each PR to merge before the next stage
    pub wait_for_merge: bool,
}

/// Run the promote command
pub async fn run_promote(config: &Config, options: PromoteOptions) -> Result<()> {
    let request = if options.cherry_pick.is_empty() {
        PromotionRequest::merge(&options.source)
    } else {
        PromotionRequest::cherry_pick(&options.source, options.cherry_pick.clone())
    };

    let git = GitCli::new(&options.path, &options.remote);
    let platform = GitHubService::new(
        &config.token,
        config.owner.clone(),
        config.repo.clone(),
        config.api_url.clone(),
    )?;
    let progress = CliProgress::new();

    print_header(config, &request);

    progress.on_phase(Phase::Validating).await;
    let validation = validate_prerequisites(&git, &request).await?;
    for commit in &validation.commits {
        println!(
            "  {} {} {}",
            check(),
            commit.short_id().accent(),
            commit.subject
        );
    }
    for w in &validation.warnings {
        eprintln!("  {} {}", warning(), w.warn());
    }

    progress.on_phase(Phase::Planning).await;
    let plan = create_promotion_plan(
        &request,
        &config.stages,
        &config.reviewers,
        validation.commits,
    )?;

    let gate = if options.wait_for_merge {
        StageGate::AfterMerge
    } else {
        StageGate::Immediate
    };

    let clock = TokioClock;
    let interrupt = CtrlC::install();
    let ctx = ExecutionContext {
        git: &git,
        platform: &platform,
        progress: &progress,
        clock: &clock,
        interrupt: &interrupt,
        poll: config.poll,
        gate,
    };

    if options.confirm && !options.dry_run {
        // Preview with a dry run first
        execute_promotion(&plan, &ctx, true).await?;
        println!();
        if !Confirm::new()
            .with_prompt("Proceed with promotion?")
            .default(true)
            .interact()
            .map_err(|e| Error::Internal(format!("failed to read confirmation: {e}")))?
        {
            println!("{}", "Aborted".muted());
            return Ok(());
        }
    }

    let result = execute_promotion(&plan, &ctx, options.dry_run).await?;

    print_summary(&plan, &result, options.dry_run);

    match result.failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn print_header(config: &Config, request: &PromotionRequest) {
    println!("{}", "Promotion".emphasis());
    println!("  Repository: {}", config.repo_spec().accent());
    println!("  Source:     {}", request.source_ref().accent());
    println!("  Mode:       {}", request.mode());
    let stages: Vec<&str> = config.stages.iter().map(|s| s.name.as_str()).collect();
    println!("  Stages:     {}", stages.join(" → "));
    if !config.reviewers.is_empty() {
        println!("  Reviewers:  {}", config.reviewers.join(", "));
    }
    println!();
}

fn print_summary(plan: &PromotionPlan, result: &PromotionResult, dry_run: bool) {
    if dry_run {
        return;
    }

    println!();
    println!("{}", "Summary".emphasis());
    for stage in &result.stages {
        match (&stage.status, &stage.pr) {
            (StageStatus::Opened | StageStatus::Reused, Some(pr)) => println!(
                "  {} {}: {} {} PR {} {}",
                check(),
                stage.stage.name,
                stage.staging_branch.accent(),
                arrow(),
                format!("#{}", pr.number).accent(),
                hyperlink_url(Stream::Stdout, &pr.html_url)
            ),
            (StageStatus::AlreadyPromoted, _) => println!(
                "  {} {}: already on {}, no PR needed",
                check(),
                stage.stage.name,
                stage.stage.target_branch.accent()
            ),
            (StageStatus::Abandoned, _) => eprintln!(
                "  {} {}: abandoned, {} left as is",
                warning(),
                stage.stage.name,
                stage.staging_branch.accent().for_stderr()
            ),
            (StageStatus::Failed, _) => {
                eprintln!("  {} {}: failed", cross(), stage.stage.name);
            }
            (StageStatus::NotAttempted, _) => println!(
                "  {}",
                format!("- {}: not attempted", stage.stage.name).muted()
            ),
            _ => {}
        }
    }

    for w in &result.warnings {
        eprintln!("  {} {}", warning(), w.warn());
    }

    let promoted = result
        .stages
        .iter()
        .filter(|s| {
            matches!(
                s.status,
                StageStatus::Opened | StageStatus::Reused | StageStatus::AlreadyPromoted
            )
        })
        .count();
    if result.success() {
        println!(
            "{} {}",
            check(),
            format!("{promoted} of {} stage(s) promoted", plan.steps.len()).success()
        );
    }
}
