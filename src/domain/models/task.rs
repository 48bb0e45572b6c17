//! Agent task model.
//!
//! An [`AgentTask`] is the unit of work the scheduler places into waves and
//! the pool sends to the remote model. Tasks are built once by the caller and
//! never mutated by the scheduler.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use super::tier::ModelTier;

/// Default priority for tasks that do not set one (lower runs first).
pub const DEFAULT_PRIORITY: i32 = 5;

/// Default role group for tasks that do not set one.
pub const DEFAULT_ROLE_GROUP: &str = "DEFAULT";

/// A single agent task to be executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentTask {
    /// Unique identifier for the task, also its node id in the DAG
    pub name: String,

    /// Prompt sent as the single user message
    pub prompt: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Names of tasks that must finish before this one starts
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Execution priority (lower = selected first)
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Free-form classification, not used for scheduling
    #[serde(default = "default_role_group")]
    pub role_group: String,

    /// Optional system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Maximum tokens for the response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Caller-supplied context
    #[serde(default)]
    pub metadata: TaskMetadata,
}

fn default_model() -> String {
    ModelTier::Sonnet.default_model_id().to_string()
}

const fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

fn default_role_group() -> String {
    DEFAULT_ROLE_GROUP.to_string()
}

const fn default_max_tokens() -> u32 {
    8192
}

const fn default_temperature() -> f32 {
    0.7
}

/// Typed task metadata.
///
/// The known keys are fields; anything else the caller attaches is kept in
/// `extra` so it survives a manifest round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TaskMetadata {
    /// Whether this task authors a test (TDD red phase)
    #[serde(default)]
    pub is_test_task: bool,

    /// Test file the task is expected to write, relative to the project root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_file: Option<PathBuf>,

    /// Checkbox id in the status file (e.g. `T001`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    /// Any other caller context
    #[serde(default, flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl AgentTask {
    /// Create a task with default model, priority and limits.
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            model: default_model(),
            depends_on: Vec::new(),
            priority: DEFAULT_PRIORITY,
            role_group: default_role_group(),
            system_prompt: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            metadata: TaskMetadata::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_role_group(mut self, role_group: impl Into<String>) -> Self {
        self.role_group = role_group.into();
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Mark the task as a test-authoring task writing `test_file`.
    pub fn as_test_task(mut self, test_file: Option<PathBuf>) -> Self {
        self.metadata.is_test_task = true;
        self.metadata.test_file = test_file;
        self
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.metadata.task_id = Some(task_id.into());
        self
    }

    /// Coarse pricing tier of this task's model.
    pub fn tier(&self) -> ModelTier {
        ModelTier::from_model_id(&self.model)
    }

    /// Whether `name` is a declared dependency.
    pub fn depends_on_task(&self, name: &str) -> bool {
        self.depends_on.iter().any(|d| d == name)
    }
}
