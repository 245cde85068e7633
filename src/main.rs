//! promote - carry a change through environment branches via pull requests
//!
//! CLI binary for the `pr_promote` engine.

use anyhow::Result;
use clap::Parser;
use pr_promote::config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "promote")]
#[command(about = "Promote a branch or cherry-picked commits through quality → preprd → main")]
#[command(version)]
struct Cli {
    /// Source branch to promote
    #[arg(short = 'b', long = "base-branch", visible_alias = "b", value_name = "BRANCH")]
    base_branch: String,

    /// Cherry-pick these commits instead of merging the whole branch
    #[arg(long, num_args = 1.., value_name = "COMMIT")]
    cherry_pick: Vec<String>,

    /// Git remote to fetch from and push to
    #[arg(long, default_value = "origin")]
    remote: String,

    /// Path to the git repository (defaults to current directory)
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Dry run - show what would be done without making changes
    #[arg(long)]
    dry_run: bool,

    /// Preview the plan and ask before making changes
    #[arg(long, conflicts_with = "dry_run")]
    confirm: bool,

    /// Wait for each stage's PR to merge before starting the next stage
    #[arg(long)]
    wait_for_merge: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    // Variables already set in the environment win over .env
    dotenvy::dotenv().ok();

    // Fails before any git command runs
    let config = Config::from_env()?;

    cli::run_promote(
        &config,
        cli::PromoteOptions {
            path: cli.path.unwrap_or_else(|| PathBuf::from(".")),
            source: cli.base_branch,
            cherry_pick: cli.cherry_pick,
            remote: cli.remote,
            dry_run: cli.dry_run,
            confirm: cli.confirm,
            wait_for_merge: cli.wait_for_merge,
        },
    )
    .await?;

    Ok(())
}
