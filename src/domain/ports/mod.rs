//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - CompletionClient: remote text-generation API
//! - WaveExecutor: runs a wave of independent tasks (the execution pool)
//! - TestCommandRunner: runs test commands for red-phase verification

pub mod completion_client;
pub mod test_runner;
pub mod wave_executor;

pub use completion_client::{Completion, CompletionClient, CompletionRequest};
pub use test_runner::{TestCommand, TestCommandRunner, TestRunError, TestRunOutput};
pub use wave_executor::WaveExecutor;
