//! Status file updates driven from scheduler callbacks.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::{task, ScriptedExecutor};
use specify_orchestrator::domain::models::{AgentTask, WaveConfig};
use specify_orchestrator::infrastructure::status_file::TaskStatusUpdater;
use specify_orchestrator::WaveScheduler;

const TASKS_MD: &str = "\
# Feature tasks

## Phase 1
- [ ] T001 Create user model
- [ ] T002 Add validation

## Phase 2
- [ ] T003 Wire up the API
";

#[tokio::test]
async fn test_results_update_checkboxes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.md");
    std::fs::write(&path, TASKS_MD).unwrap();

    let tasks = vec![
        task("model", &[]).with_task_id("T001"),
        task("T002-validation", &[]),
        task("Wire up the API", &["model"]),
    ];
    let by_name: HashMap<String, AgentTask> =
        tasks.iter().map(|t| (t.name.clone(), t.clone())).collect();

    let updater = TaskStatusUpdater::new(&path);
    let executor = Arc::new(ScriptedExecutor::new().failing("T002-validation"));
    let scheduler = WaveScheduler::new(
        executor,
        WaveConfig {
            fail_fast: false,
            ..WaveConfig::default()
        },
    )
    .on_task_complete(move |result| {
        updater.record_result(&by_name[&result.name], result)?;
        Ok(())
    });

    scheduler.execute_all(tasks).await.unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("- [x] T001 Create user model"));
    assert!(content.contains("- [!] T002 Add validation\n-   ⚠️ ERROR: scripted failure"));
    assert!(content.contains("- [x] T003 Wire up the API"));
    assert!(!dir.path().join("tasks.md.tmp").exists());
}
