//! CLI progress callback with styled output and a wait spinner

use crate::cli::style::{Stream, Stylize, arrow, check, cross, hyperlink_url, spinner_style, warning};
use anstream::{eprintln, println};
use async_trait::async_trait;
use indicatif::ProgressBar;
use pr_promote::error::Error;
use pr_promote::git::ResolutionStatus;
use pr_promote::promote::{ChangeStatus, Phase, ProgressCallback};
use pr_promote::types::{ConflictReport, EnvironmentStage, PullRequest, StagingBranch};
use std::sync::Mutex;
use std::time::Duration;

/// Prints promotion progress to the terminal
///
/// Waits (conflict resolution, PR merge) show a spinner on stderr that is
/// cleared before the next line of regular output.
pub struct CliProgress {
    spinner: Mutex<Option<ProgressBar>>,
}

impl CliProgress {
    /// Create a progress printer with no active spinner
    pub const fn new() -> Self {
        Self {
            spinner: Mutex::new(None),
        }
    }

    fn start_spinner(&self, message: String) {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style());
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(80));
        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(old) = slot.replace(spinner) {
                old.finish_and_clear();
            }
        }
    }

    fn update_spinner(&self, message: String) {
        if let Ok(slot) = self.spinner.lock() {
            if let Some(spinner) = slot.as_ref() {
                spinner.set_message(message);
            }
        }
    }

    fn stop_spinner(&self) {
        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(spinner) = slot.take() {
                spinner.finish_and_clear();
            }
        }
    }
}

#[async_trait]
impl ProgressCallback for CliProgress {
    async fn on_phase(&self, phase: Phase) {
        self.stop_spinner();
        match phase {
            Phase::Validating => println!("{}", "Validating...".muted()),
            Phase::Planning => println!("{}", "Planning...".muted()),
            Phase::Promoting | Phase::Complete => {}
        }
    }

    async fn on_stage_started(&self, index: usize, total: usize, stage: &EnvironmentStage) {
        self.stop_spinner();
        println!();
        println!(
            "{} {} {}",
            format!("[{}/{total}]", index + 1).muted(),
            stage.name.emphasis(),
            format!("({})", stage.target_branch).muted()
        );
    }

    async fn on_branch_ready(&self, branch: &StagingBranch) {
        let how = if branch.resumed {
            "Resumed"
        } else {
            "Created"
        };
        println!("  {} {how} {}", check(), branch.name.accent());
    }

    async fn on_change(&self, rev: &str, status: ChangeStatus) {
        match status {
            ChangeStatus::Applied => println!("  {} Applied {}", check(), rev.accent()),
            ChangeStatus::Resolved => {
                println!("  {} Resolved {}", check(), rev.accent());
            }
            ChangeStatus::Skipped => {
                println!("  {}", format!("- {rev} already present, skipped").muted());
            }
        }
    }

    async fn on_conflict(&self, report: &ConflictReport, steps: &[String]) {
        self.stop_spinner();
        eprintln!();
        eprintln!(
            "  {} {} conflict on {} while applying {}",
            warning(),
            report.mode.to_string().warn(),
            report.staging_branch.accent().for_stderr(),
            report.rev.accent().for_stderr()
        );
        if !report.conflicting_files.is_empty() {
            eprintln!("  Conflicting files:");
            for file in &report.conflicting_files {
                eprintln!("    {}", file.warn());
            }
        }
        eprintln!("  To continue:");
        for (i, step) in steps.iter().enumerate() {
            eprintln!("    {}. {}", i + 1, step.accent().for_stderr());
        }
        eprintln!(
            "  {}",
            "Waiting for the branch to be clean and pushed. Press Ctrl-C to stop."
                .muted()
                .for_stderr()
        );
        self.start_spinner(format!("Waiting for {}", report.staging_branch));
    }

    async fn on_resolution_pending(&self, status: &ResolutionStatus) {
        if let Some(reason) = status.pending_reason() {
            self.update_spinner(format!("Waiting: {reason}"));
        }
    }

    async fn on_conflict_resolved(&self, report: &ConflictReport) {
        self.stop_spinner();
        println!(
            "  {} Conflict on {} resolved",
            check(),
            report.staging_branch.accent()
        );
    }

    async fn on_pushed(&self, branch: &str) {
        println!("  {} Pushed {}", check(), branch.accent());
    }

    async fn on_pr_ready(&self, stage: &EnvironmentStage, pr: &PullRequest, reused: bool) {
        let verb = if reused { "Reusing" } else { "Created" };
        println!(
            "  {} {verb} PR {} {} {} {}",
            check(),
            format!("#{}", pr.number).accent(),
            pr.head_ref.emphasis(),
            arrow(),
            stage.target_branch.emphasis()
        );
        println!("    {}", hyperlink_url(Stream::Stdout, &pr.html_url));
    }

    async fn on_waiting_for_merge(&self, stage: &EnvironmentStage, pr: &PullRequest) {
        println!(
            "  {}",
            format!("Waiting for {} PR #{} to merge", stage.name, pr.number).muted()
        );
        self.start_spinner(format!("Waiting for PR #{} to merge", pr.number));
    }

    async fn on_error(&self, err: &Error) {
        self.stop_spinner();
        match err {
            Error::ReviewerAttachment(_) => eprintln!("  {} {}", warning(), err.warn()),
            _ => eprintln!("  {} {}", cross(), err.error()),
        }
    }

    async fn on_message(&self, message: &str) {
        self.stop_spinner();
        println!("{message}");
    }
}
