//! Cooperative polling for human actions
//!
//! Waiting on a person (resolving a conflict, merging a PR) is a poll loop
//! with an interval, an optional deadline and a cancellation source. Time and
//! cancellation are traits so tests can drive the loop without sleeping.

use crate::error::Result;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::debug;

/// Poll interval and optional deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Time between checks
    pub interval: Duration,
    /// Give up after this long (`None` waits forever)
    pub max_wait: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_wait: None,
        }
    }
}

/// Source of time for poll loops
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;

    /// Suspend for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Real clock backed by tokio timers
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Source of user cancellation
#[async_trait]
pub trait Interrupt: Send + Sync {
    /// Resolves when the user asks to stop; immediately if they already have
    async fn interrupted(&self);

    /// Whether the user has asked to stop
    fn is_interrupted(&self) -> bool;
}

/// Interrupt flag that stays raised once triggered
#[derive(Clone)]
pub struct InterruptLatch {
    tx: Arc<watch::Sender<bool>>,
}

impl InterruptLatch {
    /// Create a lowered latch
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Raise the latch; every current and future wait sees it
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for InterruptLatch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Interrupt for InterruptLatch {
    async fn interrupted(&self) {
        let mut rx = self.tx.subscribe();
        let closed = rx.wait_for(|raised| *raised).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }

    fn is_interrupted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Ctrl-C (SIGINT) cancellation
///
/// One listener for the whole process feeds an [`InterruptLatch`], so a
/// Ctrl-C pressed between waits is still seen by the next check. A second
/// Ctrl-C exits immediately.
pub struct CtrlC {
    latch: InterruptLatch,
}

impl CtrlC {
    /// Start listening; must be called inside a tokio runtime
    pub fn install() -> Self {
        let latch = InterruptLatch::new();
        let trigger = latch.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                // No signal handler available: never interrupt
                return;
            }
            debug!("interrupt received");
            trigger.trigger();
            if tokio::signal::ctrl_c().await.is_ok() {
                std::process::exit(130);
            }
        });
        Self { latch }
    }
}

#[async_trait]
impl Interrupt for CtrlC {
    async fn interrupted(&self) {
        self.latch.interrupted().await;
    }

    fn is_interrupted(&self) -> bool {
        self.latch.is_interrupted()
    }
}

/// Never cancels
pub struct NoInterrupt;

#[async_trait]
impl Interrupt for NoInterrupt {
    async fn interrupted(&self) {
        std::future::pending::<()>().await;
    }

    fn is_interrupted(&self) -> bool {
        false
    }
}

/// How a poll loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The check produced a value
    Ready(T),
    /// `max_wait` elapsed first
    TimedOut,
    /// The interrupt fired first
    Interrupted,
}

/// Run `check` every `settings.interval` until it yields a value
///
/// The check runs once immediately. Errors from the check end the loop.
pub async fn poll_until<T, F, Fut>(
    settings: PollSettings,
    clock: &dyn Clock,
    interrupt: &dyn Interrupt,
    mut check: F,
) -> Result<PollOutcome<T>>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Option<T>>> + Send,
    T: Send,
{
    tokio::select! {
        biased;
        () = interrupt.interrupted() => Ok(PollOutcome::Interrupted),
        outcome = run_checks(settings, clock, &mut check) => outcome,
    }
}

async fn run_checks<T, F, Fut>(
    settings: PollSettings,
    clock: &dyn Clock,
    check: &mut F,
) -> Result<PollOutcome<T>>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Option<T>>> + Send,
    T: Send,
{
    let started = clock.now();
    loop {
        if let Some(value) = check().await? {
            return Ok(PollOutcome::Ready(value));
        }
        if let Some(max) = settings.max_wait {
            if clock.now().saturating_duration_since(started) >= max {
                return Ok(PollOutcome::TimedOut);
            }
        }
        clock.sleep(settings.interval).await;
    }
}
