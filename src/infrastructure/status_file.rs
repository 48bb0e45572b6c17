//! Checkbox status updates in a markdown task list.
//!
//! Lines look like `- [ ] T001 Create user model`. A finished task becomes
//! `[x]`; a failed one becomes `[!]` followed by an indented error line.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};
use thiserror::Error;

use crate::domain::models::{AgentResult, AgentTask};

static LEADING_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(T\d{3,})").expect("valid regex"));
static ANY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(T\d{3,})\b").expect("valid regex"));

/// A status change for one checkbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskUpdate {
    /// Checkbox id, e.g. `T001`
    pub task_id: String,
    pub success: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, Error)]
pub enum StatusFileError {
    #[error("status file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("task {0} not found in status file")]
    TaskNotFound(String),

    #[error("could not determine a task id for {0}")]
    UnknownTaskId(String),

    #[error("failed to update status file: {0}")]
    Io(#[from] std::io::Error),
}

/// Updates checkboxes in a task list file
///
/// Updates from concurrent callbacks are serialized by an internal lock; each
/// update rewrites the file through a sibling temp file and a rename.
#[derive(Debug)]
pub struct TaskStatusUpdater {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TaskStatusUpdater {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply one update to the file.
    pub fn update_task_status(&self, update: &TaskUpdate) -> Result<(), StatusFileError> {
        let _guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        if !self.path.exists() {
            return Err(StatusFileError::FileNotFound(self.path.clone()));
        }
        let content = std::fs::read_to_string(&self.path)?;
        let updated = replace_checkbox(&content, update)
            .ok_or_else(|| StatusFileError::TaskNotFound(update.task_id.clone()))?;

        let tmp = self.path.with_extension("md.tmp");
        std::fs::write(&tmp, updated)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!(
            task_id = %update.task_id,
            success = update.success,
            path = %self.path.display(),
            "status file updated"
        );
        Ok(())
    }

    /// Record a task result, resolving its checkbox id.
    ///
    /// The id comes from the task metadata, else from the task name or the
    /// file content. Returns the id that was updated.
    pub fn record_result(
        &self,
        task: &AgentTask,
        result: &AgentResult,
    ) -> Result<String, StatusFileError> {
        let task_id = match task.metadata.task_id.clone() {
            Some(id) => id,
            None => {
                let content = std::fs::read_to_string(&self.path).unwrap_or_default();
                find_task_id_from_name(&task.name, &content)
                    .ok_or_else(|| StatusFileError::UnknownTaskId(task.name.clone()))?
            }
        };

        self.update_task_status(&TaskUpdate {
            task_id: task_id.clone(),
            success: result.success,
            error_message: result.error.clone(),
        })?;
        Ok(task_id)
    }
}

/// Rewrite the first open checkbox for the update's id.
///
/// Returns `None` when no `- [ ] <id>` line exists. The id must end on a word
/// boundary, so `T001` does not match `T0011`.
pub fn replace_checkbox(content: &str, update: &TaskUpdate) -> Option<String> {
    let pattern = Regex::new(&format!(
        r"^(\s*-\s*)\[\s*\]\s*({}\b.*)$",
        regex::escape(&update.task_id)
    ))
    .ok()?;

    let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
    let (index, indent, rest) = lines.iter().enumerate().find_map(|(i, line)| {
        pattern
            .captures(line)
            .map(|caps| (i, caps[1].to_string(), caps[2].to_string()))
    })?;

    if update.success {
        lines[index] = format!("{indent}[x] {rest}");
    } else {
        let message = update
            .error_message
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or("Task failed")
            .replace('\n', " ");
        lines[index] = format!("{indent}[!] {rest}");
        lines.insert(index + 1, format!("{indent}  ⚠️ ERROR: {message}"));
    }

    Some(lines.join("\n"))
}

/// Find the checkbox id for a task name.
///
/// A leading `T###` in the name wins (upper-cased). Otherwise the first line
/// of `content` mentioning the name (case-insensitive) is searched for an id.
pub fn find_task_id_from_name(task_name: &str, content: &str) -> Option<String> {
    if let Some(caps) = LEADING_ID.captures(task_name) {
        return Some(caps[1].to_uppercase());
    }

    let needle = task_name.to_lowercase();
    content
        .split('\n')
        .filter(|line| line.to_lowercase().contains(&needle))
        .find_map(|line| ANY_ID.captures(line).map(|caps| caps[1].to_string()))
}
