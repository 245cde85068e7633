//! Test data factories and test doubles for time, cancellation and progress

#![allow(dead_code)]

use async_trait::async_trait;
use pr_promote::error::Error;
use pr_promote::git::ResolutionStatus;
use pr_promote::poll::{Clock, Interrupt, PollSettings};
use pr_promote::promote::{ChangeStatus, Phase, ProgressCallback};
use pr_promote::types::{ConflictReport, EnvironmentStage, PlatformConfig, PullRequest, StagingBranch};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// Create a PR with default values
pub fn make_pr(number: u64, head: &str, base: &str) -> PullRequest {
    PullRequest {
        number,
        html_url: format!("https://github.com/test/repo/pull/{number}"),
        base_ref: base.to_string(),
        head_ref: head.to_string(),
        title: format!("PR for {head}"),
    }
}

/// Platform config for `test/repo` on github.com
pub fn github_config() -> PlatformConfig {
    PlatformConfig {
        owner: "test".to_string(),
        repo: "repo".to_string(),
        api_url: "https://api.github.com".to_string(),
    }
}

/// Poll every 5s, give up after a minute
pub fn short_poll() -> PollSettings {
    PollSettings {
        interval: Duration::from_secs(5),
        max_wait: Some(Duration::from_secs(60)),
    }
}

/// Clock that advances only when slept on
pub struct FakeClock {
    base: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<u32>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(0),
        }
    }

    /// Total simulated time slept
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap()
    }

    /// Number of sleeps
    pub fn sleeps(&self) -> u32 {
        *self.sleeps.lock().unwrap()
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.base + *self.elapsed.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        *self.elapsed.lock().unwrap() += duration;
        *self.sleeps.lock().unwrap() += 1;
        tokio::task::yield_now().await;
    }
}

/// Ctrl-C pressed as soon as the run starts waiting on the user
pub struct InterruptNow {
    fired: AtomicBool,
}

impl InterruptNow {
    pub fn new() -> Self {
        Self {
            fired: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Interrupt for InterruptNow {
    async fn interrupted(&self) {
        self.fired.store(true, Ordering::SeqCst);
    }

    fn is_interrupted(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

/// Ctrl-C pressed while the run is busy, seen from the `n + 1`th check on
pub struct InterruptAfterChecks {
    remaining: AtomicU32,
    fired: AtomicBool,
}

impl InterruptAfterChecks {
    pub fn new(n: u32) -> Self {
        Self {
            remaining: AtomicU32::new(n),
            fired: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Interrupt for InterruptAfterChecks {
    async fn interrupted(&self) {
        if !self.fired.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }

    fn is_interrupted(&self) -> bool {
        let left = self.remaining.load(Ordering::SeqCst);
        if left == 0 {
            self.fired.store(true, Ordering::SeqCst);
            return true;
        }
        self.remaining.store(left - 1, Ordering::SeqCst);
        false
    }
}

/// Progress events captured as strings
pub struct RecordingProgress {
    events: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Events starting with `prefix`
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl ProgressCallback for RecordingProgress {
    async fn on_phase(&self, phase: Phase) {
        self.push(format!("phase {phase:?}"));
    }

    async fn on_stage_started(&self, index: usize, _total: usize, stage: &EnvironmentStage) {
        self.push(format!("stage {index} {}", stage.name));
    }

    async fn on_branch_ready(&self, branch: &StagingBranch) {
        self.push(format!("branch {} resumed={}", branch.name, branch.resumed));
    }

    async fn on_change(&self, rev: &str, status: ChangeStatus) {
        self.push(format!("change {rev} {status:?}"));
    }

    async fn on_conflict(&self, report: &ConflictReport, steps: &[String]) {
        self.push(format!("conflict {} {}", report.staging_branch, report.rev));
        for step in steps {
            self.push(format!("step {step}"));
        }
    }

    async fn on_resolution_pending(&self, status: &ResolutionStatus) {
        self.push(format!(
            "pending {}",
            status.pending_reason().unwrap_or_default()
        ));
    }

    async fn on_conflict_resolved(&self, report: &ConflictReport) {
        self.push(format!("resolved {}", report.staging_branch));
    }

    async fn on_pushed(&self, branch: &str) {
        self.push(format!("pushed {branch}"));
    }

    async fn on_pr_ready(&self, stage: &EnvironmentStage, pr: &PullRequest, reused: bool) {
        self.push(format!("pr {} #{} reused={reused}", stage.name, pr.number));
    }

    async fn on_waiting_for_merge(&self, stage: &EnvironmentStage, pr: &PullRequest) {
        self.push(format!("waiting {} #{}", stage.name, pr.number));
    }

    async fn on_error(&self, error: &Error) {
        self.push(format!("error {error}"));
    }

    async fn on_message(&self, message: &str) {
        self.push(format!("message {message}"));
    }
}
