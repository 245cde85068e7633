//! Phase 1: Prerequisite checks
//!
//! Runs before any staging branch is touched.

use crate::error::{Error, Result};
use crate::git::{GitOperations, remote_ref};
use crate::types::{PromotionMode, PromotionRequest};
use tracing::debug;

/// A commit named on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Identifier as given
    pub rev: String,
    /// Full commit id
    pub id: String,
    /// Subject line
    pub subject: String,
}

impl CommitInfo {
    /// First eight characters of the commit id
    pub fn short_id(&self) -> &str {
        self.id.get(..8).unwrap_or(&self.id)
    }
}

/// What validation learned about the repository
#[derive(Debug, Clone, Default)]
pub struct Validation {
    /// Resolved cherry-pick commits, in request order
    pub commits: Vec<CommitInfo>,
    /// Non-fatal findings
    pub warnings: Vec<String>,
}

/// Check the repository, fetch, and resolve everything the request names
pub async fn validate_prerequisites(
    git: &dyn GitOperations,
    request: &PromotionRequest,
) -> Result<Validation> {
    if !git.is_repository().await? {
        return Err(Error::Validation("not inside a git repository".to_string()));
    }

    git.fetch_all().await?;

    if !git.remote_branch_exists(request.source_ref()).await? {
        return Err(Error::Validation(format!(
            "branch '{}' does not exist on the remote",
            remote_ref(git, request.source_ref())
        )));
    }

    let mut validation = Validation::default();

    if request.mode() == PromotionMode::CherryPick {
        for rev in request.commits() {
            let Some(id) = git.resolve_commit(rev).await? else {
                return Err(Error::Validation(format!("commit '{rev}' not found")));
            };
            let subject = git.commit_subject(&id).await?;
            debug!(rev, %id, %subject, "resolved commit");
            validation.commits.push(CommitInfo {
                rev: rev.clone(),
                id,
                subject,
            });
        }
    }

    let dirty = git.uncommitted_changes().await?;
    if !dirty.is_empty() {
        validation.warnings.push(format!(
            "working directory has {} uncommitted change(s)",
            dirty.len()
        ));
    }

    Ok(validation)
}
