//! Test command execution on tokio processes.
//!
//! Commands run from an argument vector, never through a shell. The child is
//! killed when its timeout elapses.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use crate::domain::ports::{TestCommand, TestCommandRunner, TestRunError, TestRunOutput};

/// Runs test commands as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessTestRunner;

impl ProcessTestRunner {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TestCommandRunner for ProcessTestRunner {
    async fn run(&self, command: &TestCommand) -> Result<TestRunOutput, TestRunError> {
        tracing::debug!(
            command = %command.display(),
            cwd = %command.cwd.display(),
            timeout_secs = command.timeout.as_secs(),
            "running test command"
        );

        let child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TestRunError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(command.timeout, child.wait_with_output())
            .await
            .map_err(|_| TestRunError::Timeout(command.timeout))?
            .map_err(|source| TestRunError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        let result = TestRunOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        tracing::debug!(
            command = %command.display(),
            exit_code = ?result.exit_code,
            "test command finished"
        );

        Ok(result)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn command(program: &str, args: &[&str], timeout: Duration) -> TestCommand {
        TestCommand {
            program: program.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
            cwd: PathBuf::from("."),
            timeout,
        }
    }

    #[tokio::test]
    async fn test_exit_code_is_reported() {
        let runner = ProcessTestRunner::new();
        let output = runner
            .run(&command("sh", &["-c", "echo out; exit 3"], Duration::from_secs(10)))
            .await
            .unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
    }

    #[tokio::test]
    async fn test_arguments_are_not_shell_expanded() {
        let runner = ProcessTestRunner::new();
        let output = runner
            .run(&command("echo", &["$HOME", "; ls"], Duration::from_secs(10)))
            .await
            .unwrap();

        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout.trim(), "$HOME ; ls");
    }

    #[tokio::test]
    async fn test_timeout() {
        let runner = ProcessTestRunner::new();
        let result = runner
            .run(&command("sleep", &["5"], Duration::from_millis(100)))
            .await;

        assert!(matches!(result, Err(TestRunError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = ProcessTestRunner::new();
        let result = runner
            .run(&command(
                "definitely-not-a-real-binary-4f2a",
                &[],
                Duration::from_secs(1),
            ))
            .await;

        assert!(matches!(result, Err(TestRunError::Spawn { .. })));
    }
}
