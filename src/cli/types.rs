//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::models::ExecutionStrategy;

#[derive(Parser)]
#[command(name = "specify-orchestrate")]
#[command(about = "Run agent task manifests as dependency-ordered waves", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .specify/orchestrate.yaml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the waves a manifest would run in, without executing anything
    Plan(PlanArgs),

    /// Execute a manifest
    Run(RunArgs),
}

#[derive(Args)]
pub struct PlanArgs {
    /// Task manifest (YAML or JSON)
    pub manifest: PathBuf,

    /// Maximum tasks per wave
    #[arg(long)]
    pub max_parallel: Option<usize>,
}

#[derive(Args)]
pub struct RunArgs {
    /// Task manifest (YAML or JSON)
    pub manifest: PathBuf,

    /// Maximum concurrent API calls
    #[arg(short, long)]
    pub pool_size: Option<usize>,

    /// Run waves one after another (same as --strategy sequential)
    #[arg(long, conflicts_with = "strategy")]
    pub sequential: bool,

    /// Execution strategy: sequential, overlapped, aggressive or batched
    #[arg(short, long)]
    pub strategy: Option<ExecutionStrategy>,

    /// Markdown task list whose checkboxes are updated as tasks finish
    #[arg(long, value_name = "PATH")]
    pub status_file: Option<PathBuf>,

    /// Verify tests written by test tasks and unlock their dependents early
    #[arg(long)]
    pub tdd: bool,

    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

impl RunArgs {
    /// Strategy override requested on the command line.
    pub const fn strategy_override(&self) -> Option<ExecutionStrategy> {
        if self.sequential {
            Some(ExecutionStrategy::Sequential)
        } else {
            self.strategy
        }
    }
}
