//! Conflict handling state machine
//!
//! ```text
//! Clean ──conflict──▶ ConflictDetected ──guidance shown──▶ AwaitingUserResolution
//!   ▲                                                       │            │
//!   └────────── returned ◀── Resolved ◀──resolution observed┘            │
//!                                        Abandoned ◀──interrupt/timeout──┘
//! ```

use crate::error::{AbandonReason, Error, Result};
use crate::types::ConflictReport;

/// Where the handler is in a conflict episode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictState {
    /// No conflict outstanding
    Clean,
    /// A merge or cherry-pick stopped on conflicts
    ConflictDetected(ConflictReport),
    /// Guidance shown, waiting for the user to resolve and push
    AwaitingUserResolution(ConflictReport),
    /// Working tree clean and pushed
    Resolved,
    /// The user gave up (terminal for the run)
    Abandoned(AbandonReason),
}

/// Inputs that move the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictEvent {
    /// Git reported a conflict
    ConflictRaised(ConflictReport),
    /// Instructions were printed; the wait begins
    GuidanceShown,
    /// Polling saw a clean, pushed branch
    ResolutionObserved,
    /// The wait ended without resolution
    Cancelled(AbandonReason),
    /// Control went back to the promotion driver
    Returned,
}

impl ConflictState {
    /// Name of the state, for logs and errors
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Clean => "Clean",
            Self::ConflictDetected(_) => "ConflictDetected",
            Self::AwaitingUserResolution(_) => "AwaitingUserResolution",
            Self::Resolved => "Resolved",
            Self::Abandoned(_) => "Abandoned",
        }
    }

    /// Apply an event, rejecting transitions the machine does not allow
    pub fn on(self, event: ConflictEvent) -> Result<Self> {
        match (self, event) {
            (Self::Clean, ConflictEvent::ConflictRaised(report)) => {
                Ok(Self::ConflictDetected(report))
            }
            (Self::ConflictDetected(report), ConflictEvent::GuidanceShown) => {
                Ok(Self::AwaitingUserResolution(report))
            }
            (Self::AwaitingUserResolution(_), ConflictEvent::ResolutionObserved) => {
                Ok(Self::Resolved)
            }
            (Self::AwaitingUserResolution(_), ConflictEvent::Cancelled(reason)) => {
                Ok(Self::Abandoned(reason))
            }
            (Self::Resolved, ConflictEvent::Returned) => Ok(Self::Clean),
            (state, event) => Err(Error::Internal(format!(
                "invalid conflict transition from {} on {event:?}",
                state.name()
            ))),
        }
    }
}
