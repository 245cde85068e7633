//! In-memory git mock for driving the promotion engine

#![allow(dead_code)]

use async_trait::async_trait;
use pr_promote::error::{Error, Result};
use pr_promote::git::{ApplyOutcome, GitOperations, InProgress, ResolutionStatus};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Mutex;

#[derive(Default)]
struct State {
    remote_branches: HashSet<String>,
    local_branches: HashSet<String>,
    current: Option<String>,
    /// Revisions on each local branch
    local_revs: HashMap<String, Vec<String>>,
    /// Revisions on each remote branch
    remote_revs: HashMap<String, Vec<String>>,
    conflicts: HashSet<String>,
    in_progress: Option<InProgress>,
    /// Revision whose conflict is waiting to be resolved
    pending: Option<String>,
    resolution_script: VecDeque<ResolutionStatus>,
    missing_commits: HashSet<String>,
    dirty: Vec<String>,
    not_a_repository: bool,
    fail_push: Option<String>,
    /// The next resolution aborts instead of committing
    abort_next_resolution: bool,
    calls: Vec<String>,
}

/// Scripted [`GitOperations`] with call tracking
///
/// Merges and cherry-picks succeed unless the revision was registered with
/// [`MockGit::conflict_on`]. While a conflict is pending, `resolution_status`
/// replays the scripted statuses and then behaves as if the user resolved,
/// committed and pushed.
pub struct MockGit {
    remote: String,
    state: Mutex<State>,
}

impl MockGit {
    /// Repository whose remote has the default environment branches and `source`
    pub fn new(source: &str) -> Self {
        let state = State {
            remote_branches: ["quality", "preprd", "main", source]
                .into_iter()
                .map(String::from)
                .collect(),
            ..State::default()
        };
        Self {
            remote: "origin".to_string(),
            state: Mutex::new(state),
        }
    }

    // === Setup ===

    /// Merging or cherry-picking `rev` stops with a conflict
    pub fn conflict_on(&self, rev: &str) {
        self.state.lock().unwrap().conflicts.insert(rev.to_string());
    }

    /// Statuses returned while waiting, before the conflict resolves
    pub fn script_resolution(&self, statuses: Vec<ResolutionStatus>) {
        self.state.lock().unwrap().resolution_script = statuses.into();
    }

    /// `resolve_commit` finds nothing for `rev`
    pub fn missing_commit(&self, rev: &str) {
        self.state
            .lock()
            .unwrap()
            .missing_commits
            .insert(rev.to_string());
    }

    /// Remove a branch from the remote
    pub fn remove_remote_branch(&self, branch: &str) {
        self.state.lock().unwrap().remote_branches.remove(branch);
    }

    /// Tracked files with uncommitted changes
    pub fn set_dirty(&self, paths: &[&str]) {
        self.state.lock().unwrap().dirty = paths.iter().map(ToString::to_string).collect();
    }

    /// `is_repository` reports false
    pub fn not_a_repository(&self) {
        self.state.lock().unwrap().not_a_repository = true;
    }

    /// Pushing `branch` fails
    pub fn fail_push(&self, branch: &str) {
        self.state.lock().unwrap().fail_push = Some(branch.to_string());
    }

    /// The next conflict is "resolved" by aborting: clean and pushed, but
    /// without the conflicting change
    pub fn abort_on_resolve(&self) {
        self.state.lock().unwrap().abort_next_resolution = true;
    }

    /// Merge the pushed `staging` branch into `target` on the remote
    pub fn merge_upstream(&self, staging: &str, target: &str) {
        let mut state = self.state.lock().unwrap();
        let revs = state.remote_revs.get(staging).cloned().unwrap_or_default();
        let merged = state.remote_revs.entry(target.to_string()).or_default();
        for rev in revs {
            if !merged.contains(&rev) {
                merged.push(rev);
            }
        }
    }

    // === Inspection ===

    /// Every call made, in order
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Forget recorded calls (state is kept)
    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Revisions on a local branch
    pub fn revs_on(&self, branch: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .local_revs
            .get(branch)
            .cloned()
            .unwrap_or_default()
    }

    /// Operation left in progress
    pub fn current_in_progress(&self) -> Option<InProgress> {
        self.state.lock().unwrap().in_progress
    }

    /// Checked-out branch
    pub fn current_branch(&self) -> Option<String> {
        self.state.lock().unwrap().current.clone()
    }

    /// Index of the first call equal to `call`
    pub fn position(&self, call: &str) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    fn record(state: &mut State, call: String) {
        state.calls.push(call);
    }

    fn apply(&self, rev: &str, op: InProgress) -> ApplyOutcome {
        let mut state = self.state.lock().unwrap();
        let name = match op {
            InProgress::Merge => "merge",
            InProgress::CherryPick => "cherry_pick",
        };
        Self::record(&mut state, format!("{name} {rev}"));

        if state.conflicts.contains(rev) {
            state.in_progress = Some(op);
            state.pending = Some(rev.to_string());
            return ApplyOutcome::Conflict {
                files: BTreeSet::from(["app/config.yml".to_string()]),
                output: format!("CONFLICT (content): Merge conflict in app/config.yml ({rev})"),
            };
        }

        if let Some(branch) = state.current.clone() {
            state.local_revs.entry(branch).or_default().push(rev.to_string());
        }
        ApplyOutcome::Applied
    }

    fn resolved_status(state: &mut State, branch: &str) -> ResolutionStatus {
        let aborted = std::mem::take(&mut state.abort_next_resolution);
        if let Some(rev) = state.pending.take().filter(|_| !aborted) {
            state
                .local_revs
                .entry(branch.to_string())
                .or_default()
                .push(rev);
        }
        state.in_progress = None;
        let revs = state.local_revs.get(branch).cloned().unwrap_or_default();
        state.remote_revs.insert(branch.to_string(), revs);
        state.remote_branches.insert(branch.to_string());
        ResolutionStatus {
            on_branch: true,
            in_progress: None,
            dirty_paths: Vec::new(),
            local_head: Some("resolved".to_string()),
            remote_head: Some("resolved".to_string()),
        }
    }
}

/// A status that keeps the handler waiting
pub fn pending_status(in_progress: Option<InProgress>) -> ResolutionStatus {
    ResolutionStatus {
        on_branch: true,
        in_progress,
        dirty_paths: Vec::new(),
        local_head: Some("local".to_string()),
        remote_head: None,
    }
}

#[async_trait]
impl GitOperations for MockGit {
    fn remote(&self) -> &str {
        &self.remote
    }

    async fn is_repository(&self) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, "is_repository".to_string());
        Ok(!state.not_a_repository)
    }

    async fn fetch_all(&self) -> Result<()> {
        Self::record(&mut self.state.lock().unwrap(), "fetch_all".to_string());
        Ok(())
    }

    async fn fetch_branch(&self, branch: &str) -> Result<()> {
        Self::record(&mut self.state.lock().unwrap(), format!("fetch {branch}"));
        Ok(())
    }

    async fn remote_branch_exists(&self, branch: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().remote_branches.contains(branch))
    }

    async fn local_branch_exists(&self, branch: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().local_branches.contains(branch))
    }

    async fn create_branch(&self, name: &str, start_point: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, format!("create_branch {name} {start_point}"));
        let revs = if start_point == format!("origin/{name}") {
            state.remote_revs.get(name).cloned().unwrap_or_default()
        } else {
            Vec::new()
        };
        state.local_revs.insert(name.to_string(), revs);
        state.local_branches.insert(name.to_string());
        state.current = Some(name.to_string());
        Ok(())
    }

    async fn checkout(&self, branch: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, format!("checkout {branch}"));
        state.current = Some(branch.to_string());
        Ok(())
    }

    async fn merge(&self, rev: &str) -> Result<ApplyOutcome> {
        Ok(self.apply(rev, InProgress::Merge))
    }

    async fn cherry_pick(&self, commit: &str) -> Result<ApplyOutcome> {
        Ok(self.apply(commit, InProgress::CherryPick))
    }

    async fn is_ancestor(&self, rev: &str, of: &str) -> Result<bool> {
        let state = self.state.lock().unwrap();
        let empty = Vec::new();
        let head = state
            .current
            .as_ref()
            .and_then(|b| state.local_revs.get(b))
            .unwrap_or(&empty);
        let container = if of == "HEAD" {
            head
        } else if let Some(branch) = of.strip_prefix("origin/") {
            state.remote_revs.get(branch).unwrap_or(&empty)
        } else {
            state.local_revs.get(of).unwrap_or(&empty)
        };
        Ok(if rev == "HEAD" {
            head.iter().all(|r| container.contains(r))
        } else {
            container.iter().any(|r| r == rev)
        })
    }

    async fn has_cherry_pick_record(&self, _commit: &str, _base: &str) -> Result<bool> {
        Ok(false)
    }

    async fn push(&self, branch: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, format!("push {branch}"));
        if state.fail_push.as_deref() == Some(branch) {
            return Err(Error::Git("remote rejected".to_string()));
        }
        let revs = state.local_revs.get(branch).cloned().unwrap_or_default();
        state.remote_revs.insert(branch.to_string(), revs);
        state.remote_branches.insert(branch.to_string());
        Ok(())
    }

    async fn resolution_status(&self, branch: &str) -> Result<ResolutionStatus> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, format!("resolution_status {branch}"));
        match state.resolution_script.pop_front() {
            Some(status) if !status.is_resolved() => Ok(status),
            _ => Ok(Self::resolved_status(&mut state, branch)),
        }
    }

    async fn in_progress(&self) -> Result<Option<InProgress>> {
        Ok(self.state.lock().unwrap().in_progress)
    }

    async fn conflicting_files(&self) -> Result<BTreeSet<String>> {
        let state = self.state.lock().unwrap();
        Ok(if state.in_progress.is_some() {
            BTreeSet::from(["app/config.yml".to_string()])
        } else {
            BTreeSet::new()
        })
    }

    async fn uncommitted_changes(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().dirty.clone())
    }

    async fn resolve_commit(&self, rev: &str) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        if rev == "CHERRY_PICK_HEAD" {
            return Ok(state.pending.clone());
        }
        Ok((!state.missing_commits.contains(rev)).then(|| rev.to_string()))
    }

    async fn commit_subject(&self, rev: &str) -> Result<String> {
        Ok(format!("Subject of {rev}"))
    }

    async fn log_subjects(&self, _base: &str, _head: &str) -> Result<Vec<String>> {
        Ok(vec!["Add feature".to_string()])
    }
}
