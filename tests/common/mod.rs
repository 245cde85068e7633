//! Shared test utilities

pub mod fixtures;
pub mod mock_git;
pub mod mock_platform;

pub use fixtures::*;
pub use mock_git::{MockGit, pending_status};
pub use mock_platform::MockPlatformService;
