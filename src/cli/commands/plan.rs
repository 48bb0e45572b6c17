//! `plan`: show the waves a manifest would run in.

use anyhow::{Context, Result};
use serde_json::json;

use super::{load_manifest, wave_config};
use crate::cli::output::TableFormatter;
use crate::cli::types::PlanArgs;
use crate::domain::models::{Config, Wave};
use crate::services::{build_waves, render_plan};

pub fn execute(args: &PlanArgs, json_mode: bool, config: &Config) -> Result<()> {
    let manifest = load_manifest(&args.manifest)?;
    let max_parallel = args
        .max_parallel
        .unwrap_or_else(|| wave_config(config, &manifest).max_parallel);

    let waves = build_waves(&manifest.tasks, max_parallel).context("Cannot plan manifest")?;

    if json_mode {
        println!("{}", serde_json::to_string_pretty(&plan_json(&waves))?);
    } else {
        println!("{}\n", render_plan(&waves));
        println!("{}", TableFormatter::new().format_waves(&waves));
        println!(
            "{} tasks in {} waves (max {} per wave)",
            manifest.tasks.len(),
            waves.len(),
            max_parallel
        );
    }
    Ok(())
}

fn plan_json(waves: &[Wave]) -> serde_json::Value {
    let waves: Vec<_> = waves
        .iter()
        .map(|wave| {
            let tasks: Vec<_> = wave
                .tasks
                .iter()
                .map(|task| {
                    json!({
                        "name": task.name,
                        "model": task.model,
                        "priority": task.priority,
                        "depends_on": task.depends_on,
                    })
                })
                .collect();
            json!({ "wave": wave.index + 1, "tasks": tasks })
        })
        .collect();
    json!({ "waves": waves })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AgentTask;

    #[test]
    fn test_plan_json_shape() {
        let tasks = vec![
            AgentTask::new("a", "p"),
            AgentTask::new("b", "p").with_dependencies(["a"]),
        ];
        let waves = build_waves(&tasks, 3).unwrap();
        let value = plan_json(&waves);

        assert_eq!(value["waves"].as_array().unwrap().len(), 2);
        assert_eq!(value["waves"][1]["wave"], 2);
        assert_eq!(value["waves"][1]["tasks"][0]["name"], "b");
        assert_eq!(value["waves"][1]["tasks"][0]["depends_on"][0], "a");
    }

    #[test]
    fn test_plan_rejects_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("tasks.yaml");
        std::fs::write(
            &manifest,
            "tasks:\n  - name: a\n    prompt: x\n    depends_on: [b]\n  - name: b\n    prompt: y\n    depends_on: [a]\n",
        )
        .unwrap();

        let args = PlanArgs {
            manifest,
            max_parallel: None,
        };
        let err = execute(&args, true, &Config::default()).unwrap_err();
        assert!(format!("{err:#}").contains("Circular dependency"));
    }
}
