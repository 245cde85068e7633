//! `git` executable backend

use crate::error::{Error, Result};
use crate::git::{ApplyOutcome, GitOperations, InProgress, ResolutionStatus};
use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::LazyLock;
use tokio::process::Command;
use tracing::debug;

static CONFLICT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^CONFLICT \([^)]*\): (?:Merge conflict in (.+)$|(\S+) deleted in )")
        .expect("hardcoded conflict pattern is valid")
});

/// Captured result of one git invocation
#[derive(Debug)]
struct GitOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl GitOutput {
    fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
            (false, true) => self.stdout.clone(),
            _ => self.stderr.clone(),
        }
    }
}

/// Git operations backed by the `git` CLI
pub struct GitCli {
    path: PathBuf,
    remote: String,
}

impl GitCli {
    /// Operate on the repository at `path`, pushing to `remote`
    pub fn new(path: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            remote: remote.into(),
        }
    }

    /// Non-interactive `git` in the repository
    ///
    /// Read-only commands skip optional locks so that background polls do not
    /// block the user's own git commands in the same working tree.
    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(&self.path)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_OPTIONAL_LOCKS", "0");
        cmd
    }

    async fn run(&self, args: &[&str]) -> Result<GitOutput> {
        debug!(?args, "running git");
        let output = self
            .command(args)
            .output()
            .await
            .map_err(|e| Error::Git(format!("failed to run git: {e}")))?;

        let result = GitOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };
        if !result.success {
            debug!(?args, stderr = %result.stderr, "git exited with failure");
        }
        Ok(result)
    }

    async fn run_checked(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args).await?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(Error::Git(format!(
                "git {} failed: {}",
                args.join(" "),
                output.combined()
            )))
        }
    }

    async fn rev_parse(&self, rev: &str) -> Result<Option<String>> {
        let output = self.run(&["rev-parse", "--verify", "--quiet", rev]).await?;
        Ok((output.success && !output.stdout.is_empty()).then_some(output.stdout))
    }

    async fn current_branch(&self) -> Result<String> {
        self.run_checked(&["branch", "--show-current"]).await
    }

    /// Classify a failed merge/cherry-pick: conflict, empty, or hard failure
    async fn classify_failure(&self, args: &[&str], output: &GitOutput) -> Result<ApplyOutcome> {
        let mut files = self.conflicting_files().await?;
        files.extend(conflict_paths_from_output(&output.combined()));

        if !files.is_empty() {
            return Ok(ApplyOutcome::Conflict {
                files,
                output: output.combined(),
            });
        }

        if self.in_progress().await? == Some(InProgress::CherryPick)
            && is_empty_pick(&output.combined())
        {
            self.run_checked(&["cherry-pick", "--skip"]).await?;
            return Ok(ApplyOutcome::Skipped);
        }

        Err(Error::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            output.combined()
        )))
    }
}

#[async_trait]
impl GitOperations for GitCli {
    fn remote(&self) -> &str {
        &self.remote
    }

    async fn is_repository(&self) -> Result<bool> {
        let output = self.run(&["rev-parse", "--is-inside-work-tree"]).await?;
        Ok(output.success && output.stdout == "true")
    }

    async fn fetch_all(&self) -> Result<()> {
        self.run_checked(&["fetch", "--all", "--prune"]).await?;
        Ok(())
    }

    async fn fetch_branch(&self, branch: &str) -> Result<()> {
        self.run_checked(&["fetch", self.remote.as_str(), branch]).await?;
        Ok(())
    }

    async fn remote_branch_exists(&self, branch: &str) -> Result<bool> {
        let rev = format!("refs/remotes/{}/{branch}", self.remote);
        Ok(self.rev_parse(&rev).await?.is_some())
    }

    async fn local_branch_exists(&self, branch: &str) -> Result<bool> {
        Ok(self
            .rev_parse(&format!("refs/heads/{branch}"))
            .await?
            .is_some())
    }

    async fn create_branch(&self, name: &str, start_point: &str) -> Result<()> {
        self.run_checked(&["checkout", "-b", name, start_point])
            .await?;
        Ok(())
    }

    async fn checkout(&self, branch: &str) -> Result<()> {
        self.run_checked(&["checkout", branch]).await?;
        Ok(())
    }

    async fn merge(&self, rev: &str) -> Result<ApplyOutcome> {
        let args = ["merge", "--no-ff", "--no-edit", rev];
        let output = self.run(&args).await?;
        if output.success {
            return Ok(if output.stdout.contains("Already up to date") {
                ApplyOutcome::Skipped
            } else {
                ApplyOutcome::Applied
            });
        }
        self.classify_failure(&args, &output).await
    }

    async fn cherry_pick(&self, commit: &str) -> Result<ApplyOutcome> {
        let args = ["cherry-pick", "-x", commit];
        let output = self.run(&args).await?;
        if output.success {
            return Ok(ApplyOutcome::Applied);
        }
        self.classify_failure(&args, &output).await
    }

    async fn is_ancestor(&self, rev: &str, of: &str) -> Result<bool> {
        let output = self.run(&["merge-base", "--is-ancestor", rev, of]).await?;
        Ok(output.success)
    }

    async fn has_cherry_pick_record(&self, commit: &str, base: &str) -> Result<bool> {
        let Some(full) = self.rev_parse(&format!("{commit}^{{commit}}")).await? else {
            return Ok(false);
        };
        let grep = format!("--grep=cherry picked from commit {full}");
        let range = format!("{base}..HEAD");
        let found = self
            .run_checked(&["log", "--format=%H", "--fixed-strings", &grep, &range])
            .await?;
        Ok(!found.is_empty())
    }

    async fn push(&self, branch: &str) -> Result<()> {
        self.run_checked(&["push", "-u", self.remote.as_str(), branch])
            .await?;
        Ok(())
    }

    async fn resolution_status(&self, branch: &str) -> Result<ResolutionStatus> {
        // A branch that was never pushed makes this fetch fail; that is a pending state
        let _ = self.run(&["fetch", self.remote.as_str(), branch]).await?;

        Ok(ResolutionStatus {
            on_branch: self.current_branch().await? == branch,
            in_progress: self.in_progress().await?,
            dirty_paths: self.uncommitted_changes().await?,
            local_head: self.rev_parse("HEAD").await?,
            remote_head: self
                .rev_parse(&format!("refs/remotes/{}/{branch}", self.remote))
                .await?,
        })
    }

    async fn in_progress(&self) -> Result<Option<InProgress>> {
        if self.rev_parse("MERGE_HEAD").await?.is_some() {
            return Ok(Some(InProgress::Merge));
        }
        if self.rev_parse("CHERRY_PICK_HEAD").await?.is_some() {
            return Ok(Some(InProgress::CherryPick));
        }
        Ok(None)
    }

    async fn conflicting_files(&self) -> Result<BTreeSet<String>> {
        let output = self
            .run_checked(&["diff", "--name-only", "--diff-filter=U"])
            .await?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    async fn uncommitted_changes(&self) -> Result<Vec<String>> {
        let output = self.run_checked(&["status", "--porcelain"]).await?;
        Ok(parse_porcelain(&output))
    }

    async fn resolve_commit(&self, rev: &str) -> Result<Option<String>> {
        self.rev_parse(&format!("{rev}^{{commit}}")).await
    }

    async fn commit_subject(&self, rev: &str) -> Result<String> {
        self.run_checked(&["log", "-1", "--pretty=format:%s", rev])
            .await
    }

    async fn log_subjects(&self, base: &str, head: &str) -> Result<Vec<String>> {
        let range = format!("{base}..{head}");
        let output = self
            .run_checked(&["log", &range, "--pretty=format:%s", "--no-merges"])
            .await?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect())
    }
}

/// Tracked paths from `git status --porcelain`; untracked (`??`) entries are ignored
fn parse_porcelain(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.len() > 3 && !line.starts_with("??") && !line.starts_with("!!"))
        .map(|line| {
            let path = &line[3..];
            // Renames are reported as "old -> new"
            path.rsplit(" -> ").next().unwrap_or(path).to_string()
        })
        .collect()
}

/// Conflict paths named in merge/cherry-pick output
fn conflict_paths_from_output(output: &str) -> BTreeSet<String> {
    CONFLICT_LINE
        .captures_iter(output)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

fn is_empty_pick(output: &str) -> bool {
    output.contains("previous cherry-pick is now empty") || output.contains("nothing to commit")
}
