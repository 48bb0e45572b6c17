//! Task manifest: the boundary format callers hand to the CLI.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::config::WaveConfig;
use super::task::AgentTask;
use crate::domain::errors::ManifestError;

/// Tasks to run plus optional wave configuration overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TaskManifest {
    /// Replaces the configured wave settings when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waves: Option<WaveConfig>,

    /// Tasks in declaration order
    #[serde(default)]
    pub tasks: Vec<AgentTask>,
}

impl TaskManifest {
    pub fn from_yaml(input: &str) -> Result<Self, ManifestError> {
        let manifest: Self = serde_yaml::from_str(input)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_json(input: &str) -> Result<Self, ManifestError> {
        let manifest: Self = serde_json::from_str(input)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Reject manifests the scheduler cannot key by name.
    ///
    /// Dependencies on unknown names are allowed; they count as satisfied by
    /// the aggregator and block the wave builder like any missing dependency.
    pub fn validate(&self) -> Result<(), ManifestError> {
        let mut seen = HashSet::new();
        for task in &self.tasks {
            if task.name.trim().is_empty() {
                return Err(ManifestError::EmptyName);
            }
            if !seen.insert(task.name.as_str()) {
                return Err(ManifestError::DuplicateTask(task.name.clone()));
            }
            if task.depends_on.iter().any(|d| d == &task.name) {
                return Err(ManifestError::SelfDependency(task.name.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ExecutionStrategy;

    #[test]
    fn test_parse_yaml_manifest() {
        let yaml = r#"
waves:
  max_parallel: 4
  strategy: sequential
tasks:
  - name: T001-analyze
    prompt: "Analyze"
    metadata: { task_id: T001 }
  - name: T002-implement
    prompt: "Implement"
    depends_on: [T001-analyze]
    priority: 1
"#;
        let manifest = TaskManifest::from_yaml(yaml).expect("manifest should parse");
        let waves = manifest.waves.expect("waves section");
        assert_eq!(waves.max_parallel, 4);
        assert_eq!(waves.strategy, ExecutionStrategy::Sequential);
        assert!(waves.fail_fast);
        assert_eq!(manifest.tasks.len(), 2);
        assert_eq!(manifest.tasks[1].depends_on, vec!["T001-analyze"]);
        assert_eq!(manifest.tasks[0].metadata.task_id.as_deref(), Some("T001"));
    }

    #[test]
    fn test_parse_json_manifest() {
        let json = r#"{"tasks": [{"name": "a", "prompt": "p"}]}"#;
        let manifest = TaskManifest::from_json(json).expect("manifest should parse");
        assert!(manifest.waves.is_none());
        assert_eq!(manifest.tasks[0].name, "a");
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let yaml = "tasks:\n  - {name: a, prompt: p}\n  - {name: a, prompt: q}\n";
        assert!(matches!(
            TaskManifest::from_yaml(yaml),
            Err(ManifestError::DuplicateTask(name)) if name == "a"
        ));
    }

    #[test]
    fn test_self_dependency_rejected() {
        let yaml = "tasks:\n  - {name: a, prompt: p, depends_on: [a]}\n";
        assert!(matches!(
            TaskManifest::from_yaml(yaml),
            Err(ManifestError::SelfDependency(_))
        ));
    }

    #[test]
    fn test_empty_name_rejected() {
        let yaml = "tasks:\n  - {name: '  ', prompt: p}\n";
        assert!(matches!(
            TaskManifest::from_yaml(yaml),
            Err(ManifestError::EmptyName)
        ));
    }
}
