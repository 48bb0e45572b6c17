//! TDD red-phase verification.
//!
//! When a test-authoring task succeeds, the test it wrote is located and run
//! once before any implementation exists. A failing test confirms the red
//! phase and lets the scheduler unlock the task's dependents early.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{SchedulerError, SchedulerResult};
use crate::domain::models::{AgentResult, AgentTask, TddConfig};
use crate::domain::ports::{TestCommand, TestCommandRunner};

/// Patterns agents use when reporting a file they wrote.
static FILE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"Created file:\s*(\S+)",
        r"Writing to\s+(\S+)",
        r"(?m)^\s*File:\s*(\S+)",
        r"```[\w+#-]*:([^\s`]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Test frameworks recognised by their marker files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestFramework {
    Cargo,
    Go,
    Vitest,
    Jest,
    Pytest,
}

const PYTEST_MARKERS: [&str; 5] = [
    "pyproject.toml",
    "pytest.ini",
    "setup.py",
    "setup.cfg",
    "conftest.py",
];

const VITEST_MARKERS: [&str; 4] = [
    "vitest.config.ts",
    "vitest.config.js",
    "vitest.config.mts",
    "vitest.config.mjs",
];

impl TestFramework {
    /// Detect the framework from marker files in `root`.
    pub fn detect(root: &Path) -> Option<Self> {
        let has = |name: &str| root.join(name).is_file();

        if has("Cargo.toml") {
            Some(Self::Cargo)
        } else if has("go.mod") {
            Some(Self::Go)
        } else if VITEST_MARKERS.iter().any(|m| has(m)) {
            Some(Self::Vitest)
        } else if has("package.json") {
            Some(Self::Jest)
        } else if PYTEST_MARKERS.iter().any(|m| has(m)) {
            Some(Self::Pytest)
        } else {
            None
        }
    }

    /// Exit codes meaning "tests ran and failed".
    pub const fn failure_codes(self) -> &'static [i32] {
        match self {
            Self::Cargo => &[101],
            Self::Go | Self::Vitest | Self::Jest => &[1],
            Self::Pytest => &[1, 2],
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cargo => "cargo",
            Self::Go => "go",
            Self::Vitest => "vitest",
            Self::Jest => "jest",
            Self::Pytest => "pytest",
        }
    }

    /// Command running only `test_file`, relative to the project root.
    pub fn command(self, test_file: &Path, cwd: &Path, timeout: Duration) -> TestCommand {
        let file = test_file.to_string_lossy().into_owned();
        let (program, args): (&str, Vec<String>) = match self {
            Self::Cargo => {
                let in_tests_dir = test_file
                    .parent()
                    .is_some_and(|p| p.file_name().is_some_and(|n| n == "tests"));
                match test_file.file_stem() {
                    Some(stem) if in_tests_dir => (
                        "cargo",
                        vec![
                            "test".into(),
                            "--test".into(),
                            stem.to_string_lossy().into_owned(),
                        ],
                    ),
                    _ => ("cargo", vec!["test".into()]),
                }
            }
            Self::Go => {
                let package = match test_file.parent() {
                    Some(dir) if !dir.as_os_str().is_empty() => {
                        format!("./{}", dir.to_string_lossy())
                    }
                    _ => "./...".to_string(),
                };
                ("go", vec!["test".into(), package])
            }
            Self::Vitest => ("npx", vec!["vitest".into(), "run".into(), file]),
            Self::Jest => ("npx", vec!["jest".into(), file]),
            Self::Pytest => (
                "python",
                vec!["-m".into(), "pytest".into(), file, "-x".into(), "-q".into()],
            ),
        };

        TestCommand {
            program: program.to_string(),
            args,
            cwd: cwd.to_path_buf(),
            timeout,
        }
    }
}

impl fmt::Display for TestFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// The new test failed: red phase confirmed
    FailedAsExpected,
    /// The new test passed without an implementation
    UnexpectedlyPassed,
    /// No framework detected; assumed valid
    Skipped,
    /// File missing, command failed to run, or an unknown exit code
    Error,
}

impl VerificationStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FailedAsExpected => "failed_as_expected",
            Self::UnexpectedlyPassed => "unexpectedly_passed",
            Self::Skipped => "skipped",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub task: String,
    pub status: VerificationStatus,
    pub test_file: Option<PathBuf>,
    pub framework: Option<TestFramework>,
    pub exit_code: Option<i32>,
    pub test_failed: bool,
    pub message: String,
}

impl VerificationResult {
    fn new(task: &str, status: VerificationStatus, message: impl Into<String>) -> Self {
        Self {
            task: task.to_string(),
            status,
            test_file: None,
            framework: None,
            exit_code: None,
            test_failed: false,
            message: message.into(),
        }
    }

    /// Whether dependents of the task may be dispatched early.
    pub const fn allows_unlock(&self) -> bool {
        matches!(
            self.status,
            VerificationStatus::FailedAsExpected | VerificationStatus::Skipped
        )
    }
}

/// Runs freshly written tests and classifies the outcome
pub struct TddVerifier {
    config: TddConfig,
    runner: Arc<dyn TestCommandRunner>,
}

impl TddVerifier {
    pub fn new(config: TddConfig, runner: Arc<dyn TestCommandRunner>) -> Self {
        Self { config, runner }
    }

    pub const fn config(&self) -> &TddConfig {
        &self.config
    }

    /// Whether `result` should trigger a verification.
    pub fn should_verify(task: &AgentTask, result: &AgentResult) -> bool {
        result.success && task.metadata.is_test_task
    }

    /// Verify the test written by `task`.
    ///
    /// # Errors
    /// `TddViolation` when the test passed and `block_on_passing_test` is
    /// set. Every other outcome is reported in the returned result.
    #[instrument(skip_all, fields(task = %task.name))]
    pub async fn verify(
        &self,
        task: &AgentTask,
        result: &AgentResult,
    ) -> SchedulerResult<VerificationResult> {
        let root = &self.config.project_root;

        let candidates = locate_test_file(task, &result.output);
        let Some(test_file) = self.wait_for_file(&candidates).await else {
            let outcome = self.error(task, "test file not found");
            return Ok(outcome);
        };

        let Some(framework) = TestFramework::detect(root) else {
            info!(test_file = %test_file.display(), "no test framework detected, skipping verification");
            return Ok(VerificationResult {
                test_file: Some(test_file),
                ..VerificationResult::new(
                    &task.name,
                    VerificationStatus::Skipped,
                    "no test framework detected",
                )
            });
        };

        let command = framework.command(
            &test_file,
            root,
            Duration::from_secs(self.config.test_timeout_secs),
        );
        let output = match self.runner.run(&command).await {
            Ok(output) => output,
            Err(err) => {
                let mut outcome = self.error(task, err.to_string());
                outcome.test_file = Some(test_file);
                outcome.framework = Some(framework);
                return Ok(outcome);
            }
        };

        let base = VerificationResult {
            test_file: Some(test_file.clone()),
            framework: Some(framework),
            exit_code: output.exit_code,
            ..VerificationResult::new(&task.name, VerificationStatus::Error, "")
        };

        match output.exit_code {
            Some(code) if framework.failure_codes().contains(&code) => {
                info!(%framework, exit_code = code, "test failed as expected");
                Ok(VerificationResult {
                    status: VerificationStatus::FailedAsExpected,
                    test_failed: true,
                    message: format!("{framework} exited with {code}"),
                    ..base
                })
            }
            Some(0) => {
                warn!(%framework, test_file = %test_file.display(), "test passed before implementation");
                if self.config.block_on_passing_test {
                    return Err(SchedulerError::TddViolation {
                        task: task.name.clone(),
                        test_file: test_file.display().to_string(),
                    });
                }
                Ok(VerificationResult {
                    status: VerificationStatus::UnexpectedlyPassed,
                    message: "test passed before implementation".to_string(),
                    ..base
                })
            }
            code => {
                let message = code.map_or_else(
                    || format!("{framework} was terminated by a signal"),
                    |c| format!("{framework} exited with unexpected code {c}"),
                );
                let mut outcome = self.error(task, message);
                outcome.test_file = base.test_file;
                outcome.framework = base.framework;
                outcome.exit_code = base.exit_code;
                Ok(outcome)
            }
        }
    }

    fn error(&self, task: &AgentTask, message: impl Into<String>) -> VerificationResult {
        let outcome = VerificationResult::new(&task.name, VerificationStatus::Error, message);
        if self.config.fallback_to_normal_flow {
            warn!(error = %outcome.message, "verification failed, continuing with normal flow");
        } else {
            tracing::error!(error = %outcome.message, "verification failed");
        }
        outcome
    }

    /// Poll for the first existing candidate.
    async fn wait_for_file(&self, candidates: &[PathBuf]) -> Option<PathBuf> {
        if candidates.is_empty() {
            return None;
        }
        let root = &self.config.project_root;
        let attempts = self.config.file_poll_retries.max(1);

        for attempt in 1..=attempts {
            for candidate in candidates {
                let path = root.join(candidate);
                if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    continue;
                }
                if !resolves_under(root, &path).await {
                    warn!(path = %path.display(), "ignoring test file outside the project root");
                    continue;
                }
                debug!(path = %path.display(), attempt, "test file found");
                return Some(candidate.clone());
            }
            if attempt < attempts {
                tokio::time::sleep(Duration::from_millis(self.config.file_poll_delay_ms)).await;
            }
        }
        None
    }
}

impl fmt::Debug for TddVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TddVerifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Candidate test file paths for `task`, most specific first.
///
/// Metadata wins; otherwise paths reported in the task output are used, and
/// only when neither yields anything the naming conventions are tried.
pub fn locate_test_file(task: &AgentTask, output: &str) -> Vec<PathBuf> {
    if let Some(path) = &task.metadata.test_file {
        return vec![path.clone()];
    }

    let mut found: Vec<PathBuf> = Vec::new();
    for pattern in FILE_PATTERNS.iter() {
        for caps in pattern.captures_iter(output) {
            let raw = caps[1]
                .trim_start_matches(['`', '"', '\''])
                .trim_end_matches(['`', '"', '\'', ',', ';', ':', ')', '.']);
            let path = PathBuf::from(raw);
            if raw.is_empty() || found.contains(&path) {
                continue;
            }
            if is_relative_inside(&path) {
                found.push(path);
            } else {
                debug!(path = raw, "skipping reported path outside the project");
            }
        }
    }
    if !found.is_empty() {
        return found;
    }

    conventional_paths(&task.name)
}

/// Relative, and never climbs above the directory it is joined to.
fn is_relative_inside(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Whether `path` (symlinks resolved) lies under `root`.
async fn resolves_under(root: &Path, path: &Path) -> bool {
    match (
        tokio::fs::canonicalize(root).await,
        tokio::fs::canonicalize(path).await,
    ) {
        (Ok(root), Ok(path)) => path.starts_with(root),
        _ => false,
    }
}

fn conventional_paths(task_name: &str) -> Vec<PathBuf> {
    let slug: String = task_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let dashed = slug.replace('_', "-");

    [
        format!("tests/test_{slug}.py"),
        format!("test_{slug}.py"),
        format!("tests/{dashed}.test.ts"),
        format!("tests/{dashed}.test.js"),
        format!("src/{dashed}.test.ts"),
        format!("tests/{slug}.rs"),
        format!("{slug}_test.go"),
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}
