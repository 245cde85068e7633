//! Pull request body rendering

use crate::types::EnvironmentStage;
use chrono::{DateTime, Local};
use std::fmt::Write;

/// Changes listed before the rest are summarized
pub const MAX_LISTED_CHANGES: usize = 10;

/// A PR opened by an earlier stage in the same run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedPr {
    /// Stage name
    pub stage: String,
    /// PR number
    pub number: u64,
}

/// Everything the body mentions
#[derive(Debug, Clone)]
pub struct BodyContext<'a> {
    /// Source branch
    pub source_ref: &'a str,
    /// One line per change, already formatted
    pub changes: &'a [String],
    /// PRs from earlier stages of this run
    pub related: &'a [RelatedPr],
    /// All stages of the run, in order
    pub stages: &'a [EnvironmentStage],
    /// Position of the current stage in `stages`
    pub index: usize,
    /// Creation time stamped at the bottom
    pub created_at: DateTime<Local>,
}

/// Numbered change list, capped at [`MAX_LISTED_CHANGES`]
pub fn render_change_list(changes: &[String]) -> String {
    if changes.is_empty() {
        return "_No new commits to describe_".to_string();
    }

    let mut out = String::new();
    for (i, change) in changes.iter().take(MAX_LISTED_CHANGES).enumerate() {
        let _ = writeln!(out, "{}. {change}", i + 1);
    }
    if changes.len() > MAX_LISTED_CHANGES {
        let _ = writeln!(
            out,
            "_...and {} more commit(s)_",
            changes.len() - MAX_LISTED_CHANGES
        );
    }
    out.trim_end().to_string()
}

/// Render the markdown body for one stage's PR
pub fn render_pr_body(ctx: &BodyContext<'_>) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "**Source:** `{}`", ctx.source_ref);
    let _ = writeln!(body, "\n### Changes\n{}", render_change_list(ctx.changes));

    if !ctx.related.is_empty() {
        let _ = writeln!(body, "\n### Related PRs");
        for pr in ctx.related {
            let _ = writeln!(body, "- {}: #{}", pr.stage, pr.number);
        }
    }

    let _ = writeln!(body, "\n---");

    let previous: Vec<&str> = ctx.stages[..ctx.index.min(ctx.stages.len())]
        .iter()
        .map(|s| s.name.as_str())
        .collect();
    if !previous.is_empty() {
        let _ = writeln!(body, "_Previous: {} ✓_", previous.join(" ✓ | "));
    }

    let next: Vec<&str> = ctx
        .stages
        .iter()
        .skip(ctx.index + 1)
        .map(|s| s.name.as_str())
        .collect();
    if !next.is_empty() {
        let _ = writeln!(body, "_Next: {}_", next.join(" → "));
    }

    if ctx.stages.get(ctx.index).is_some_and(EnvironmentStage::is_production) {
        let _ = writeln!(
            body,
            "\n⚠️ **PRODUCTION DEPLOYMENT** - Review carefully before merging."
        );
    }

    let _ = write!(
        body,
        "\n_Created by pr-promote at {}_",
        ctx.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    body
}
