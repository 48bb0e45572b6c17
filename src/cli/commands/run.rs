//! `run`: execute a manifest against the remote API.

use anyhow::{Context, Result};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use super::{load_manifest, wave_config};
use crate::cli::output::{ProgressPrinter, TableFormatter};
use crate::cli::types::RunArgs;
use crate::domain::models::{AgentTask, Config, ExecutionReport, PoolStatsSnapshot, WaveConfig};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::process::ProcessTestRunner;
use crate::infrastructure::status_file::TaskStatusUpdater;
use crate::services::{AgentPool, TddVerifier, WaveScheduler};

pub async fn execute(args: RunArgs, json_mode: bool, mut config: Config) -> Result<()> {
    let manifest = load_manifest(&args.manifest)?;
    let waves = wave_config(&config, &manifest);
    apply_overrides(&args, &mut config, waves);
    ConfigLoader::validate(&config)?;

    let api_key = args
        .api_key
        .clone()
        .or_else(|| config.api.api_key.clone())
        .filter(|key| !key.trim().is_empty())
        .context("No API key: set ANTHROPIC_API_KEY or pass --api-key")?;

    let run_id = Uuid::new_v4();
    let pool = Arc::new(AgentPool::connect(&config, &api_key).context("Failed to create pool")?);

    let tasks_by_name: HashMap<String, AgentTask> = manifest
        .tasks
        .iter()
        .map(|task| (task.name.clone(), task.clone()))
        .collect();
    let progress = Arc::new(if json_mode {
        ProgressPrinter::hidden(manifest.tasks.len())
    } else {
        ProgressPrinter::new(manifest.tasks.len())
    });
    let task_progress = Arc::clone(&progress);
    let wave_progress = Arc::clone(&progress);
    let status = args.status_file.clone().map(TaskStatusUpdater::new);

    let mut scheduler = WaveScheduler::new(pool.clone(), config.waves.clone())
        .on_task_complete(move |result| {
            task_progress.task_finished(result)?;
            if let (Some(updater), Some(task)) = (&status, tasks_by_name.get(&result.name)) {
                updater.record_result(task, result)?;
            }
            Ok(())
        })
        .on_wave_complete(move |wave| {
            wave_progress.wave_finished(wave)?;
            Ok(())
        });

    if config.tdd.early_test_verification {
        let verifier = TddVerifier::new(config.tdd.clone(), Arc::new(ProcessTestRunner::new()));
        scheduler = scheduler.with_tdd_verifier(verifier);
    }

    info!(%run_id, tasks = manifest.tasks.len(), strategy = %config.waves.strategy, "run started");
    let outcome = scheduler
        .execute_all(manifest.tasks)
        .instrument(info_span!("run", %run_id))
        .await;
    progress.finish();

    let report = scheduler.generate_report();
    let stats = pool.statistics();
    pool.close();

    let aborted = outcome.as_ref().err().map(ToString::to_string);
    if json_mode {
        let body = run_json(run_id, &report, &stats, scheduler.early_unlocks(), aborted);
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        let formatter = TableFormatter::new();
        println!("{}\n", report.summary());
        if !report.results.is_empty() {
            println!("{}\n", formatter.format_results(&report));
        }
        println!("{}", formatter.format_stats(&stats));
        if config.tdd.early_test_verification {
            println!("Early unlocks: {}", scheduler.early_unlocks());
        }
    }

    outcome.map(|_| ()).context("Run aborted")
}

/// Fold command-line flags into the loaded configuration.
fn apply_overrides(args: &RunArgs, config: &mut Config, waves: WaveConfig) {
    config.waves = waves;
    if let Some(pool_size) = args.pool_size {
        config.pool.pool_size = pool_size;
    }
    if let Some(strategy) = args.strategy_override() {
        config.waves.strategy = strategy;
    }
    if args.tdd {
        config.tdd.early_test_verification = true;
    }
}

fn run_json(
    run_id: Uuid,
    report: &ExecutionReport,
    stats: &PoolStatsSnapshot,
    early_unlocks: usize,
    error: Option<String>,
) -> serde_json::Value {
    let mut results: Vec<_> = report.results.values().collect();
    results.sort_by(|a, b| a.name.cmp(&b.name));

    json!({
        "run_id": run_id,
        "success": report.success && error.is_none(),
        "error": error,
        "duration_ms": report.total_duration_ms,
        "waves": report.waves.len(),
        "failed_tasks": report.failed_tasks,
        "total_cost": report.total_cost(),
        "total_tokens": report.total_tokens(),
        "early_unlocks": early_unlocks,
        "results": results,
        "statistics": stats,
    })
}
