//! CLI commands
//!
//! Terminal front end for the `promote` binary.

mod progress;
mod promote;
mod style;

pub use promote::{PromoteOptions, run_promote};
