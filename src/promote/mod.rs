//! Three-phase promotion engine
//!
//! 1. Validation - check the repository and resolve the request
//! 2. Planning - fix staging branch names and PR titles per stage
//! 3. Execution - branch, apply, resolve conflicts, push, open PRs

mod body;
mod execute;
mod plan;
mod progress;
mod validate;

pub use body::{BodyContext, MAX_LISTED_CHANGES, RelatedPr, render_change_list, render_pr_body};
pub use execute::{
    ExecutionContext, PromotionResult, StageGate, StageReport, StageStatus, execute_promotion,
};
pub use plan::{PromotionPlan, StagePlan, create_promotion_plan, pr_title};
pub use progress::{ChangeStatus, Phase, ProgressCallback};
pub use validate::{CommitInfo, Validation, validate_prerequisites};
