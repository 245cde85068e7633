//! pr-promote - environment promotion through pull requests
//!
//! Carries a feature branch, or a list of cherry-picked commits, through an
//! ordered list of environment branches (`quality` → `preprd` → `main`). For
//! every stage a staging branch is cut from the target, the change is applied
//! on top of it, and a pull request is opened back into the target.
//!
//! The engine is interface-agnostic: git and the hosting provider sit behind
//! the [`git::GitOperations`] and [`platform::PullRequestService`] traits, and
//! progress is reported through [`promote::ProgressCallback`].

pub mod config;
pub mod conflict;
pub mod error;
pub mod git;
pub mod platform;
pub mod poll;
pub mod promote;
pub mod stages;
pub mod types;
