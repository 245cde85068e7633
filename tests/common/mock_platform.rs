//! Mock pull request service for testing

#![allow(dead_code)]

use async_trait::async_trait;
use pr_promote::error::{ApiFailure, Error, Result};
use pr_promote::platform::PullRequestService;
use pr_promote::types::{PlatformConfig, PrState, PullRequest, PullRequestDescriptor};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Call record for `request_reviewers`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewersCall {
    pub pr_number: u64,
    pub reviewers: Vec<String>,
}

/// Hand-written mock of [`PullRequestService`]
///
/// Features:
/// - Auto-incrementing PR numbers
/// - Call tracking for verification
/// - Pre-existing open PRs per head branch
/// - Scripted PR states for merge gating
/// - Error injection for failure paths
pub struct MockPlatformService {
    config: PlatformConfig,
    next_pr_number: AtomicU64,
    open_prs: Mutex<HashMap<String, PullRequest>>,
    pr_states: Mutex<HashMap<u64, VecDeque<PrState>>>,
    // Call tracking
    find_pr_calls: Mutex<Vec<(String, String)>>,
    create_pr_calls: Mutex<Vec<PullRequestDescriptor>>,
    reviewers_calls: Mutex<Vec<ReviewersCall>>,
    state_calls: Mutex<Vec<u64>>,
    // Error injection
    error_on_find_pr: Mutex<Option<ApiFailure>>,
    error_on_create_pr: Mutex<Option<ApiFailure>>,
    error_on_reviewers: Mutex<Option<ApiFailure>>,
}

impl MockPlatformService {
    /// Create a new mock for `test/repo`
    pub fn new() -> Self {
        Self::with_config(PlatformConfig {
            owner: "test".to_string(),
            repo: "repo".to_string(),
            api_url: "https://api.github.com".to_string(),
        })
    }

    /// Create a new mock with the given config
    pub fn with_config(config: PlatformConfig) -> Self {
        Self {
            config,
            next_pr_number: AtomicU64::new(1),
            open_prs: Mutex::new(HashMap::new()),
            pr_states: Mutex::new(HashMap::new()),
            find_pr_calls: Mutex::new(Vec::new()),
            create_pr_calls: Mutex::new(Vec::new()),
            reviewers_calls: Mutex::new(Vec::new()),
            state_calls: Mutex::new(Vec::new()),
            error_on_find_pr: Mutex::new(None),
            error_on_create_pr: Mutex::new(None),
            error_on_reviewers: Mutex::new(None),
        }
    }

    // === Setup ===

    /// Pretend an open PR already exists for `head`
    pub fn add_open_pr(&self, pr: PullRequest) {
        self.open_prs
            .lock()
            .unwrap()
            .insert(pr.head_ref.clone(), pr);
    }

    /// States returned by successive `pull_request_state` calls; the last repeats
    pub fn script_pr_states(&self, pr_number: u64, states: &[PrState]) {
        self.pr_states
            .lock()
            .unwrap()
            .insert(pr_number, states.iter().copied().collect());
    }

    // === Error injection ===

    /// Make `find_open_pr` fail
    pub fn fail_find_pr(&self, kind: ApiFailure) {
        *self.error_on_find_pr.lock().unwrap() = Some(kind);
    }

    /// Make `create_pr` fail
    pub fn fail_create_pr(&self, kind: ApiFailure) {
        *self.error_on_create_pr.lock().unwrap() = Some(kind);
    }

    /// Make `request_reviewers` fail
    pub fn fail_reviewers(&self, kind: ApiFailure) {
        *self.error_on_reviewers.lock().unwrap() = Some(kind);
    }

    // === Call verification ===

    /// All `(head, base)` pairs passed to `find_open_pr`
    pub fn get_find_pr_calls(&self) -> Vec<(String, String)> {
        self.find_pr_calls.lock().unwrap().clone()
    }

    /// All `create_pr` descriptors
    pub fn get_create_pr_calls(&self) -> Vec<PullRequestDescriptor> {
        self.create_pr_calls.lock().unwrap().clone()
    }

    /// All `request_reviewers` calls
    pub fn get_reviewers_calls(&self) -> Vec<ReviewersCall> {
        self.reviewers_calls.lock().unwrap().clone()
    }

    /// PR numbers passed to `pull_request_state`
    pub fn get_state_calls(&self) -> Vec<u64> {
        self.state_calls.lock().unwrap().clone()
    }

    /// Assert that `create_pr` was called with specific head and base
    pub fn assert_create_pr_called(&self, head: &str, base: &str) {
        let calls = self.get_create_pr_calls();
        assert!(
            calls.iter().any(|c| c.head == head && c.base == base),
            "Expected create_pr({head}, {base}) but got: {calls:?}"
        );
    }

    fn injected(slot: &Mutex<Option<ApiFailure>>) -> Result<()> {
        match *slot.lock().unwrap() {
            Some(kind) => Err(Error::Api {
                kind,
                message: format!("injected {kind} failure"),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PullRequestService for MockPlatformService {
    async fn find_open_pr(&self, head: &str, base: &str) -> Result<Option<PullRequest>> {
        self.find_pr_calls
            .lock()
            .unwrap()
            .push((head.to_string(), base.to_string()));
        Self::injected(&self.error_on_find_pr)?;

        let prs = self.open_prs.lock().unwrap();
        Ok(prs.get(head).filter(|pr| pr.base_ref == base).cloned())
    }

    async fn create_pr(&self, descriptor: &PullRequestDescriptor) -> Result<PullRequest> {
        self.create_pr_calls.lock().unwrap().push(descriptor.clone());
        Self::injected(&self.error_on_create_pr)?;

        let number = self.next_pr_number.fetch_add(1, Ordering::SeqCst);
        Ok(PullRequest {
            number,
            html_url: format!("https://github.com/test/repo/pull/{number}"),
            base_ref: descriptor.base.clone(),
            head_ref: descriptor.head.clone(),
            title: descriptor.title.clone(),
        })
    }

    async fn request_reviewers(&self, pr_number: u64, reviewers: &[String]) -> Result<()> {
        self.reviewers_calls.lock().unwrap().push(ReviewersCall {
            pr_number,
            reviewers: reviewers.to_vec(),
        });
        Self::injected(&self.error_on_reviewers)
    }

    async fn pull_request_state(&self, pr_number: u64) -> Result<PrState> {
        self.state_calls.lock().unwrap().push(pr_number);
        let mut states = self.pr_states.lock().unwrap();
        let Some(queue) = states.get_mut(&pr_number) else {
            return Ok(PrState::Merged);
        };
        let state = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().copied()
        };
        Ok(state.unwrap_or(PrState::Open))
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
