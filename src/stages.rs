//! Environment table
//!
//! The fixed, ordered promotion sequence and `PR_ENVS` selection.

use crate::error::{Error, Result};
use crate::types::EnvironmentStage;
use std::collections::HashSet;

/// Default stage keys, in promotion order
pub const DEFAULT_KEYS: [&str; 3] = ["qas", "stg", "main"];

fn stage(name: &str, key: &str, target: &str, suffix: &str, prefix: &str) -> EnvironmentStage {
    EnvironmentStage {
        name: name.to_string(),
        key: key.to_string(),
        target_branch: target.to_string(),
        staging_suffix: suffix.to_string(),
        pr_title_prefix: prefix.to_string(),
    }
}

/// The full default table: Quality → `PreProduction` → Production
pub fn default_stages() -> Vec<EnvironmentStage> {
    vec![
        stage("Quality", "qas", "quality", "qas", "dev-qas"),
        stage("PreProduction", "stg", "preprd", "stg", "qas-stg"),
        stage("Production", "main", "main", "main", "stg-main"),
    ]
}

/// Select stages by key, keeping table order
///
/// `None` selects the whole table. Unknown keys are rejected rather than
/// silently dropped.
pub fn select_stages(keys: Option<&[String]>) -> Result<Vec<EnvironmentStage>> {
    let table = default_stages();
    let Some(keys) = keys else {
        return Ok(table);
    };

    let unknown: Vec<&str> = keys
        .iter()
        .map(String::as_str)
        .filter(|k| !table.iter().any(|s| s.key == *k))
        .collect();
    if !unknown.is_empty() {
        return Err(Error::Config(format!(
            "unknown environment(s) in PR_ENVS: {}. Available: {}",
            unknown.join(", "),
            DEFAULT_KEYS.join(", ")
        )));
    }

    let selected: Vec<EnvironmentStage> = table
        .into_iter()
        .filter(|s| keys.iter().any(|k| *k == s.key))
        .collect();
    validate_stages(&selected)?;
    Ok(selected)
}

/// Check the table invariants: non-empty, distinct targets and suffixes
pub fn validate_stages(stages: &[EnvironmentStage]) -> Result<()> {
    if stages.is_empty() {
        return Err(Error::Config(format!(
            "no environments selected. Available: {}",
            DEFAULT_KEYS.join(", ")
        )));
    }

    let mut targets = HashSet::new();
    let mut suffixes = HashSet::new();
    for s in stages {
        if !targets.insert(s.target_branch.as_str()) {
            return Err(Error::Config(format!(
                "target branch '{}' appears in more than one stage",
                s.target_branch
            )));
        }
        if !suffixes.insert(s.staging_suffix.as_str()) {
            return Err(Error::Config(format!(
                "staging suffix '{}' appears in more than one stage",
                s.staging_suffix
            )));
        }
    }
    Ok(())
}
