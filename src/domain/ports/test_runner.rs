use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A test command as an argument vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory
    pub cwd: PathBuf,
    /// The process is killed once this elapses
    pub timeout: Duration,
}

impl TestCommand {
    /// Render the command for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Exit status and captured output of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestRunOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Error)]
pub enum TestRunError {
    #[error("test command timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Port trait for running test commands
#[async_trait]
pub trait TestCommandRunner: Send + Sync {
    /// Run the command to completion or until its timeout.
    async fn run(&self, command: &TestCommand) -> Result<TestRunOutput, TestRunError>;
}
