//! Error types for pr-promote

use std::fmt;
use thiserror::Error;

/// Classified hosting-provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFailure {
    /// Bad or missing credentials (401/403)
    Unauthorized,
    /// Primary or secondary rate limit hit (429, or 403 with rate-limit text)
    RateLimited,
    /// Repository, branch or PR not found (404)
    NotFound,
    /// Request rejected by validation (422), e.g. base branch missing
    Unprocessable,
    /// Transport-level failure, no HTTP status
    Network,
    /// Anything else
    Other,
}

impl ApiFailure {
    /// Classify an HTTP status code and response message
    pub fn from_status(status: u16, message: &str) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 if message.to_lowercase().contains("rate limit") => Self::RateLimited,
            403 => Self::Unauthorized,
            404 => Self::NotFound,
            422 => Self::Unprocessable,
            429 => Self::RateLimited,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unauthorized => "unauthorized",
            Self::RateLimited => "rate limited",
            Self::NotFound => "not found",
            Self::Unprocessable => "rejected",
            Self::Network => "network",
            Self::Other => "unexpected response",
        };
        f.write_str(s)
    }
}

/// Why a wait for human action ended without success
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    /// The user interrupted the run
    Interrupted,
    /// The configured maximum wait elapsed
    TimedOut,
}

impl fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupted => f.write_str("interrupted"),
            Self::TimedOut => f.write_str("timed out"),
        }
    }
}

/// Errors that can occur in pr-promote
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid configuration (token, repo, env lists)
    #[error("configuration error: {0}")]
    Config(String),

    /// Prerequisite check failed before any stage ran
    #[error("validation failed: {0}")]
    Validation(String),

    /// Staging branch could not be created
    #[error("{stage}: failed to create staging branch '{branch}': {message}")]
    BranchCreation {
        /// Stage name
        stage: String,
        /// Staging branch name
        branch: String,
        /// Underlying failure
        message: String,
    },

    /// Staging branch could not be pushed
    #[error("{stage}: failed to push '{branch}': {message}")]
    Push {
        /// Stage name
        stage: String,
        /// Staging branch name
        branch: String,
        /// Underlying failure
        message: String,
    },

    /// Pull request could not be opened
    #[error("{stage}: failed to open pull request {head} → {base} ({kind}): {message}")]
    Publish {
        /// Stage name
        stage: String,
        /// Head (staging) branch
        head: String,
        /// Base (target) branch
        base: String,
        /// Failure classification
        kind: ApiFailure,
        /// Underlying failure
        message: String,
    },

    /// Conflict resolution or a merge wait was abandoned
    #[error("{stage}: waiting on '{branch}' abandoned ({reason})")]
    Abandoned {
        /// Stage name
        stage: String,
        /// Branch left for the user
        branch: String,
        /// Why the wait ended
        reason: AbandonReason,
    },

    /// The previous stage's pull request cannot gate the next stage
    #[error("{stage}: {message}")]
    Gate {
        /// Stage name
        stage: String,
        /// What went wrong
        message: String,
    },

    /// A git command failed
    #[error("git error: {0}")]
    Git(String),

    /// Hosting provider API error
    #[error("GitHub API error ({kind}): {message}")]
    Api {
        /// Failure classification
        kind: ApiFailure,
        /// Provider message
        message: String,
    },

    /// Reviewers could not be attached (reported as a warning)
    #[error("failed to add reviewers: {0}")]
    ReviewerAttachment(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Failure classification for API-level errors
    pub const fn api_failure(&self) -> Option<ApiFailure> {
        match self {
            Self::Api { kind, .. } | Self::Publish { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<octocrab::Error> for Error {
    fn from(err: octocrab::Error) -> Self {
        match &err {
            octocrab::Error::GitHub { source, .. } => Self::Api {
                kind: ApiFailure::from_status(source.status_code.as_u16(), &source.message),
                message: source.message.clone(),
            },
            octocrab::Error::Service { .. } => Self::Api {
                kind: ApiFailure::Network,
                message: err.to_string(),
            },
            _ => Self::Api {
                kind: ApiFailure::Other,
                message: err.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = err.status().map_or(ApiFailure::Network, |s| {
            ApiFailure::from_status(s.as_u16(), "")
        });
        Self::Api {
            kind,
            message: err.to_string(),
        }
    }
}

/// Result type alias for pr-promote
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status_codes() {
        assert_eq!(ApiFailure::from_status(401, ""), ApiFailure::Unauthorized);
        assert_eq!(ApiFailure::from_status(403, "Forbidden"), ApiFailure::Unauthorized);
        assert_eq!(
            ApiFailure::from_status(403, "API rate limit exceeded for user"),
            ApiFailure::RateLimited
        );
        assert_eq!(ApiFailure::from_status(404, ""), ApiFailure::NotFound);
        assert_eq!(ApiFailure::from_status(422, ""), ApiFailure::Unprocessable);
        assert_eq!(ApiFailure::from_status(429, ""), ApiFailure::RateLimited);
        assert_eq!(ApiFailure::from_status(500, ""), ApiFailure::Other);
    }

    #[test]
    fn test_stage_errors_name_stage_and_branch() {
        let err = Error::Push {
            stage: "Quality".to_string(),
            branch: "feature-x-qas".to_string(),
            message: "rejected".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Quality: failed to push 'feature-x-qas': rejected"
        );

        let err = Error::Abandoned {
            stage: "Production".to_string(),
            branch: "feature-x-main".to_string(),
            reason: AbandonReason::Interrupted,
        };
        assert!(err.to_string().contains("Production"));
        assert!(err.to_string().contains("interrupted"));
    }

    #[test]
    fn test_api_failure_accessor() {
        let err = Error::Publish {
            stage: "Quality".to_string(),
            head: "a".to_string(),
            base: "quality".to_string(),
            kind: ApiFailure::RateLimited,
            message: "slow down".to_string(),
        };
        assert_eq!(err.api_failure(), Some(ApiFailure::RateLimited));
        assert_eq!(Error::Git("x".to_string()).api_failure(), None);
    }
}
