//! Local git operations
//!
//! [`GitOperations`] is the capability the promotion engine needs from git.
//! [`GitCli`] implements it by shelling out to the `git` executable; tests use
//! scripted implementations.

mod cli;

pub use cli::GitCli;

use crate::error::{Error, Result};
use crate::types::{ConflictReport, EnvironmentStage, PromotionMode, PromotionRequest, StagingBranch};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;

/// A git operation left half-done in the working tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InProgress {
    /// `MERGE_HEAD` exists
    Merge,
    /// `CHERRY_PICK_HEAD` exists
    CherryPick,
}

impl fmt::Display for InProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge => f.write_str("merge"),
            Self::CherryPick => f.write_str("cherry-pick"),
        }
    }
}

/// Result of a single merge or cherry-pick attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new commit was created
    Applied,
    /// Nothing to do: already present, or the change became empty
    Skipped,
    /// Stopped with unresolved conflicts; the operation is left in progress
    Conflict {
        /// Paths with conflicts
        files: BTreeSet<String>,
        /// Combined git output
        output: String,
    },
}

/// Snapshot used to decide whether a conflict has been resolved
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolutionStatus {
    /// HEAD is on the staging branch
    pub on_branch: bool,
    /// Merge or cherry-pick still in progress
    pub in_progress: Option<InProgress>,
    /// Tracked paths with uncommitted changes
    pub dirty_paths: Vec<String>,
    /// Local HEAD commit
    pub local_head: Option<String>,
    /// Remote-tracking ref of the staging branch
    pub remote_head: Option<String>,
}

impl ResolutionStatus {
    /// Working tree clean and the remote ref matches local HEAD
    pub fn is_resolved(&self) -> bool {
        self.pending_reason().is_none()
    }

    /// First unmet condition, for display while waiting
    pub fn pending_reason(&self) -> Option<String> {
        if !self.on_branch {
            return Some("staging branch is not checked out".to_string());
        }
        if let Some(op) = self.in_progress {
            return Some(format!("{op} still in progress"));
        }
        if !self.dirty_paths.is_empty() {
            return Some(format!(
                "{} uncommitted change(s): {}",
                self.dirty_paths.len(),
                self.dirty_paths.join(", ")
            ));
        }
        match (&self.local_head, &self.remote_head) {
            (_, None) => Some("branch not pushed yet".to_string()),
            (Some(local), Some(remote)) if local == remote => None,
            _ => Some("remote branch does not match local HEAD, push again".to_string()),
        }
    }
}

/// Git capability used by the promotion engine
///
/// All operations act on a single working directory and remote.
#[async_trait]
pub trait GitOperations: Send + Sync {
    /// Remote name (e.g. "origin")
    fn remote(&self) -> &str;

    /// Whether the directory is inside a git work tree
    async fn is_repository(&self) -> Result<bool>;

    /// `fetch --all --prune`
    async fn fetch_all(&self) -> Result<()>;

    /// Fetch a single branch from the remote
    async fn fetch_branch(&self, branch: &str) -> Result<()>;

    /// Whether `<remote>/<branch>` exists
    async fn remote_branch_exists(&self, branch: &str) -> Result<bool>;

    /// Whether a local branch exists
    async fn local_branch_exists(&self, branch: &str) -> Result<bool>;

    /// Create `name` at `start_point` and check it out
    async fn create_branch(&self, name: &str, start_point: &str) -> Result<()>;

    /// Check out an existing local branch
    async fn checkout(&self, branch: &str) -> Result<()>;

    /// `merge --no-ff --no-edit <rev>` into HEAD
    async fn merge(&self, rev: &str) -> Result<ApplyOutcome>;

    /// `cherry-pick -x <commit>` onto HEAD
    async fn cherry_pick(&self, commit: &str) -> Result<ApplyOutcome>;

    /// Whether `rev` is an ancestor of (or equal to) `of`
    async fn is_ancestor(&self, rev: &str, of: &str) -> Result<bool>;

    /// Whether `rev` is an ancestor of HEAD
    async fn is_ancestor_of_head(&self, rev: &str) -> Result<bool> {
        self.is_ancestor(rev, "HEAD").await
    }

    /// Whether a commit since `base` records "cherry picked from commit `commit`"
    async fn has_cherry_pick_record(&self, commit: &str, base: &str) -> Result<bool>;

    /// Push the branch and set upstream
    async fn push(&self, branch: &str) -> Result<()>;

    /// Resolution snapshot for `branch` (fetches the remote ref first)
    async fn resolution_status(&self, branch: &str) -> Result<ResolutionStatus>;

    /// Operation left in progress in the working tree
    async fn in_progress(&self) -> Result<Option<InProgress>>;

    /// Paths with unresolved conflicts
    async fn conflicting_files(&self) -> Result<BTreeSet<String>>;

    /// Tracked paths with uncommitted changes
    async fn uncommitted_changes(&self) -> Result<Vec<String>>;

    /// Full commit id if `rev` names a commit
    async fn resolve_commit(&self, rev: &str) -> Result<Option<String>>;

    /// Subject line of a commit
    async fn commit_subject(&self, rev: &str) -> Result<String>;

    /// Subjects of non-merge commits in `base..head`, newest first
    async fn log_subjects(&self, base: &str, head: &str) -> Result<Vec<String>>;
}

/// Outcome of applying the whole request to a staging branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    /// Every change is on the branch
    Complete {
        /// Revisions applied in this call
        applied: Vec<String>,
        /// Revisions already present or empty
        skipped: Vec<String>,
    },
    /// Stopped at a conflict; later commits were not attempted
    Conflict {
        /// The conflict
        report: ConflictReport,
        /// Revisions applied before the conflict
        applied: Vec<String>,
        /// Revisions skipped before the conflict
        skipped: Vec<String>,
    },
}

/// Deterministic staging branch name: `<source>-<suffix>`
///
/// Characters that are awkward in ref names collapse to `-`.
pub fn staging_branch_name(source_ref: &str, suffix: &str) -> String {
    let mut safe = String::with_capacity(source_ref.len());
    for c in source_ref.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            c
        } else {
            '-'
        };
        if !(c == '-' && safe.ends_with('-')) {
            safe.push(c);
        }
    }
    let safe = safe.trim_matches(|c| c == '-' || c == '.');
    format!("{safe}-{suffix}")
}

/// Remote-tracking ref for a branch
pub fn remote_ref(git: &dyn GitOperations, branch: &str) -> String {
    format!("{}/{branch}", git.remote())
}

/// Create (or reuse) the staging branch for a stage
///
/// A branch left by an earlier run is checked out untouched so partial
/// conflict resolution is never discarded.
pub async fn create_staging_branch(
    git: &dyn GitOperations,
    stage: &EnvironmentStage,
    name: &str,
) -> Result<StagingBranch> {
    let fail = |message: String| Error::BranchCreation {
        stage: stage.name.clone(),
        branch: name.to_string(),
        message,
    };

    if git.local_branch_exists(name).await? {
        git.checkout(name).await.map_err(|e| fail(e.to_string()))?;
        return Ok(StagingBranch {
            name: name.to_string(),
            stage: stage.clone(),
            resumed: true,
        });
    }

    git.fetch_branch(&stage.target_branch)
        .await
        .map_err(|e| fail(format!("cannot fetch {}: {e}", stage.target_branch)))?;

    if !git.remote_branch_exists(&stage.target_branch).await? {
        return Err(fail(format!(
            "target branch {} does not exist",
            remote_ref(git, &stage.target_branch)
        )));
    }

    // Pushed by an earlier run but deleted locally: continue from the remote copy
    let resumed = git.remote_branch_exists(name).await?;
    let start = if resumed {
        remote_ref(git, name)
    } else {
        remote_ref(git, &stage.target_branch)
    };

    git.create_branch(name, &start)
        .await
        .map_err(|e| fail(e.to_string()))?;

    Ok(StagingBranch {
        name: name.to_string(),
        stage: stage.clone(),
        resumed,
    })
}

/// Whether `rev` is already on the checked-out staging branch
///
/// A cherry-picked commit also counts when a commit since the target branch
/// records it with `cherry-pick -x`.
pub async fn change_present(
    git: &dyn GitOperations,
    staging: &StagingBranch,
    mode: PromotionMode,
    rev: &str,
) -> Result<bool> {
    if git.is_ancestor_of_head(rev).await? {
        return Ok(true);
    }
    match mode {
        PromotionMode::MergeBranch => Ok(false),
        PromotionMode::CherryPick => {
            let target = remote_ref(git, &staging.stage.target_branch);
            git.has_cherry_pick_record(rev, &target).await
        }
    }
}

/// Apply the request's changes to the checked-out staging branch
///
/// Changes already on the branch are skipped, so calling this again after a
/// conflict has been resolved continues with the next commit.
pub async fn apply_change(
    git: &dyn GitOperations,
    staging: &StagingBranch,
    request: &PromotionRequest,
) -> Result<ApplyResult> {
    let mut applied = Vec::new();
    let mut skipped = Vec::new();

    let revs: Vec<String> = match request.mode() {
        PromotionMode::MergeBranch => vec![remote_ref(git, request.source_ref())],
        PromotionMode::CherryPick => request.commits().to_vec(),
    };

    for rev in revs {
        if change_present(git, staging, request.mode(), &rev).await? {
            skipped.push(rev);
            continue;
        }

        let outcome = match request.mode() {
            PromotionMode::MergeBranch => git.merge(&rev).await?,
            PromotionMode::CherryPick => git.cherry_pick(&rev).await?,
        };

        match outcome {
            ApplyOutcome::Applied => applied.push(rev),
            ApplyOutcome::Skipped => skipped.push(rev),
            ApplyOutcome::Conflict { files, output } => {
                let report = ConflictReport {
                    stage: staging.stage.clone(),
                    staging_branch: staging.name.clone(),
                    rev,
                    mode: request.mode(),
                    conflicting_files: files,
                    raw_tool_output: output,
                };
                return Ok(ApplyResult::Conflict {
                    report,
                    applied,
                    skipped,
                });
            }
        }
    }

    Ok(ApplyResult::Complete { applied, skipped })
}
