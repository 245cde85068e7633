//! Conflict handling
//!
//! When a merge or cherry-pick stops on conflicts, the handler prints
//! file-level guidance and waits until the user has resolved, committed and
//! pushed the staging branch, or gives up.

mod state;

pub use state::{ConflictEvent, ConflictState};

use crate::error::{AbandonReason, Result};
use crate::git::GitOperations;
use crate::poll::{Clock, Interrupt, PollOutcome, PollSettings, poll_until};
use crate::promote::ProgressCallback;
use crate::types::{ConflictReport, PromotionMode};
use std::sync::Mutex;
use tracing::debug;

/// How a conflict episode ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Branch is clean and pushed; continue
    Resolved,
    /// The user stopped waiting
    Abandoned(AbandonReason),
}

/// Drives [`ConflictState`] for one stage
pub struct ConflictHandler<'a> {
    git: &'a dyn GitOperations,
    clock: &'a dyn Clock,
    interrupt: &'a dyn Interrupt,
    settings: PollSettings,
    state: ConflictState,
}

impl<'a> ConflictHandler<'a> {
    /// Create a handler in the `Clean` state
    pub fn new(
        git: &'a dyn GitOperations,
        clock: &'a dyn Clock,
        interrupt: &'a dyn Interrupt,
        settings: PollSettings,
    ) -> Self {
        Self {
            git,
            clock,
            interrupt,
            settings,
            state: ConflictState::Clean,
        }
    }

    /// Current state
    pub const fn state(&self) -> &ConflictState {
        &self.state
    }

    fn transition(&mut self, event: ConflictEvent) -> Result<()> {
        let current = std::mem::replace(&mut self.state, ConflictState::Clean);
        let from = current.name();
        match current.on(event) {
            Ok(next) => {
                debug!(from, to = next.name(), "conflict state transition");
                self.state = next;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Handle one conflict: print guidance, then block until resolved or abandoned
    ///
    /// Abandoning leaves the working tree exactly as the user left it.
    pub async fn handle(
        &mut self,
        report: ConflictReport,
        progress: &dyn ProgressCallback,
    ) -> Result<Resolution> {
        self.transition(ConflictEvent::ConflictRaised(report.clone()))?;

        let steps = resolution_steps(&report, self.git.remote());
        progress.on_conflict(&report, &steps).await;
        self.transition(ConflictEvent::GuidanceShown)?;

        let git = self.git;
        let branch = report.staging_branch.as_str();
        let last_reason: &Mutex<Option<String>> = &Mutex::new(None);

        let outcome = poll_until(self.settings, self.clock, self.interrupt, move || async move {
            let status = git.resolution_status(branch).await?;
            if status.is_resolved() {
                return Ok(Some(()));
            }
            let reason = status.pending_reason();
            let changed = {
                let mut last = last_reason
                    .lock()
                    .map_err(|_| crate::error::Error::Internal("poll state poisoned".to_string()))?;
                let changed = *last != reason;
                last.clone_from(&reason);
                changed
            };
            if changed {
                progress.on_resolution_pending(&status).await;
            }
            Ok(None)
        })
        .await?;

        match outcome {
            PollOutcome::Ready(()) => {
                self.transition(ConflictEvent::ResolutionObserved)?;
                progress.on_conflict_resolved(&report).await;
                self.transition(ConflictEvent::Returned)?;
                Ok(Resolution::Resolved)
            }
            PollOutcome::TimedOut => {
                self.transition(ConflictEvent::Cancelled(AbandonReason::TimedOut))?;
                Ok(Resolution::Abandoned(AbandonReason::TimedOut))
            }
            PollOutcome::Interrupted => {
                self.transition(ConflictEvent::Cancelled(AbandonReason::Interrupted))?;
                Ok(Resolution::Abandoned(AbandonReason::Interrupted))
            }
        }
    }
}

/// Numbered instructions for resolving a conflict by hand
pub fn resolution_steps(report: &ConflictReport, remote: &str) -> Vec<String> {
    let files: Vec<&str> = report
        .conflicting_files
        .iter()
        .map(String::as_str)
        .collect();

    let mut steps = vec![format!("git checkout {}", report.staging_branch)];
    if files.is_empty() {
        steps.push("Resolve the conflicts listed by `git status`".to_string());
        steps.push("git add <resolved files>".to_string());
    } else {
        steps.push(format!("Resolve conflicts in: {}", files.join(", ")));
        steps.push(format!("git add {}", files.join(" ")));
    }
    match report.mode {
        PromotionMode::MergeBranch => steps.push("git commit --no-edit".to_string()),
        PromotionMode::CherryPick => steps.push("git cherry-pick --continue".to_string()),
    }
    steps.push(format!("git push -u {remote} {}", report.staging_branch));
    steps
}
