//! Specify Orchestrator - wave-based execution of agent task graphs
//!
//! Tasks declared in a manifest are grouped into dependency-ordered waves and
//! sent to a remote language model through a bounded, rate-limited pool.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and port traits
//! - **Service Layer** (`services`): Scheduling, pooling, batching and TDD verification
//! - **Infrastructure Layer** (`infrastructure`): HTTP client, config, logging, processes
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use specify_orchestrator::{AgentPool, AgentTask, Config, WaveScheduler};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let pool = Arc::new(AgentPool::connect(&config, "sk-ant-...")?);
//!     let scheduler = WaveScheduler::new(pool, config.waves.clone());
//!
//!     let tasks = vec![
//!         AgentTask::new("analyze", "Summarize the module"),
//!         AgentTask::new("report", "Write the report").with_dependencies(["analyze"]),
//!     ];
//!     let results = scheduler.execute_all(tasks).await?;
//!     println!("{}", scheduler.generate_report().summary());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    AgentResult, AgentTask, BatchGroup, Config, ExecutionReport, ExecutionStrategy, ModelTier,
    PoolStatsSnapshot, TaskManifest, Wave, WaveConfig,
};
pub use domain::ports::{CompletionClient, TestCommandRunner, WaveExecutor};
pub use domain::{ApiError, ManifestError, SchedulerError, SchedulerResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{AgentPool, BatchAggregator, TddVerifier, WaveScheduler};
