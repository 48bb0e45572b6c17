//! End-to-end behaviour of the four execution strategies against a scripted
//! executor.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use common::{names, task, ScriptedExecutor};
use specify_orchestrator::domain::models::{ExecutionStrategy, WaveConfig};
use specify_orchestrator::{SchedulerError, WaveScheduler};

fn config(strategy: ExecutionStrategy) -> WaveConfig {
    WaveConfig {
        strategy,
        ..WaveConfig::default()
    }
}

fn scheduler(executor: &Arc<ScriptedExecutor>, config: WaveConfig) -> WaveScheduler {
    WaveScheduler::new(executor.clone(), config)
}

#[tokio::test]
async fn test_sequential_runs_waves_in_order() {
    let executor = Arc::new(ScriptedExecutor::new().with_delay("slow", 150));
    let scheduler = scheduler(&executor, config(ExecutionStrategy::Sequential));

    let results = scheduler
        .execute_all(vec![
            task("fast", &[]),
            task("slow", &[]),
            task("next", &["fast"]),
        ])
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(executor.calls(), vec![names(&["fast", "slow"]), names(&["next"])]);
    assert!(executor.started_at("next") >= executor.finished_at("slow"));

    let report = scheduler.generate_report();
    assert!(report.success);
    assert_eq!(report.waves.len(), 2);
    assert!(report.waves.iter().all(|w| w.finished));
}

#[tokio::test]
async fn test_sequential_fail_fast_stops_later_waves() {
    let executor = Arc::new(ScriptedExecutor::new().failing("a"));
    let scheduler = scheduler(&executor, config(ExecutionStrategy::Sequential));

    let err = scheduler
        .execute_all(vec![task("a", &[]), task("b", &[]), task("c", &["b"])])
        .await
        .unwrap_err();

    assert_eq!(
        err,
        SchedulerError::WaveFailed {
            index: 0,
            failed: names(&["a"]),
        }
    );
    assert!(!executor.executed().contains("c"));

    // results recorded before the abort stay available
    let completed = scheduler.completed();
    assert_eq!(completed.len(), 2);
    assert!(completed["b"].success);
}

#[tokio::test]
async fn test_failures_are_reported_without_fail_fast() {
    let executor = Arc::new(ScriptedExecutor::new().failing("a"));
    let scheduler = scheduler(
        &executor,
        WaveConfig {
            fail_fast: false,
            ..config(ExecutionStrategy::Sequential)
        },
    );

    let results = scheduler
        .execute_all(vec![task("a", &[]), task("b", &[]), task("c", &["a"])])
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert!(!results["a"].success);
    assert!(results["c"].success);

    let report = scheduler.generate_report();
    assert!(!report.success);
    assert_eq!(report.failed_tasks, names(&["a"]));
}

#[tokio::test]
async fn test_overlapped_starts_next_wave_at_threshold() {
    let executor = Arc::new(ScriptedExecutor::new().with_delay("fast", 10).with_delay("slow", 400));
    let scheduler = scheduler(
        &executor,
        WaveConfig {
            overlap_threshold: 0.5,
            ..config(ExecutionStrategy::Overlapped)
        },
    );

    let results = scheduler
        .execute_all(vec![
            task("fast", &[]),
            task("slow", &[]),
            task("next", &["fast"]),
        ])
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert!(executor.started_at("next") < executor.finished_at("slow"));
    assert!(executor.started_at("next") >= executor.finished_at("fast"));
}

#[tokio::test]
async fn test_overlap_disabled_waits_for_whole_wave() {
    let executor = Arc::new(ScriptedExecutor::new().with_delay("fast", 10).with_delay("slow", 150));
    let scheduler = scheduler(
        &executor,
        WaveConfig {
            overlap_enabled: false,
            overlap_threshold: 0.1,
            ..config(ExecutionStrategy::Overlapped)
        },
    );

    scheduler
        .execute_all(vec![
            task("fast", &[]),
            task("slow", &[]),
            task("next", &["fast"]),
        ])
        .await
        .unwrap();

    assert!(executor.started_at("next") >= executor.finished_at("slow"));
}

#[tokio::test]
async fn test_aggressive_ignores_configured_threshold() {
    let executor = Arc::new(ScriptedExecutor::new().with_delay("fast", 10).with_delay("slow", 400));
    let scheduler = scheduler(
        &executor,
        WaveConfig {
            overlap_threshold: 1.0,
            ..config(ExecutionStrategy::Aggressive)
        },
    );

    scheduler
        .execute_all(vec![
            task("fast", &[]),
            task("slow", &[]),
            task("next", &["fast"]),
        ])
        .await
        .unwrap();

    assert!(executor.started_at("next") < executor.finished_at("slow"));
}

#[tokio::test]
async fn test_overlapped_fail_fast_reports_after_all_waves() {
    let executor = Arc::new(ScriptedExecutor::new().failing("a"));
    let scheduler = scheduler(&executor, config(ExecutionStrategy::Overlapped));

    let err = scheduler
        .execute_all(vec![task("a", &[]), task("b", &[]), task("c", &["b"])])
        .await
        .unwrap_err();

    assert!(matches!(err, SchedulerError::WaveFailed { index: 0, .. }));
    assert!(scheduler.completed().contains_key("c"));
}

#[tokio::test]
async fn test_batched_regroups_by_dependency_level() {
    let executor = Arc::new(ScriptedExecutor::new());
    let scheduler = scheduler(
        &executor,
        WaveConfig {
            max_parallel: 2,
            ..config(ExecutionStrategy::Batched)
        },
    );

    let tasks = vec![
        task("a", &[]),
        task("b", &[]),
        task("c", &["a"]),
        task("d", &[]),
    ];
    let waves = scheduler.build_waves(&tasks).unwrap();
    assert_eq!(waves[0].task_names(), vec!["a", "b"]);
    assert_eq!(waves[1].task_names(), vec!["c", "d"]);

    let results = scheduler.execute_all(tasks).await.unwrap();

    assert_eq!(results.len(), 4);
    assert_eq!(executor.calls(), vec![names(&["a", "b", "d"]), names(&["c"])]);
    assert!(scheduler.waves().iter().all(|w| w.finished));
}

#[tokio::test]
async fn test_batched_fail_fast_stops_after_failed_batch() {
    let executor = Arc::new(ScriptedExecutor::new().failing("a").failing("b"));
    let scheduler = scheduler(&executor, config(ExecutionStrategy::Batched));

    let err = scheduler
        .execute_all(vec![task("b", &[]), task("a", &[]), task("c", &["a"])])
        .await
        .unwrap_err();

    assert_eq!(
        err,
        SchedulerError::BatchFailed {
            failed: names(&["a", "b"]),
        }
    );
    assert_eq!(executor.calls().len(), 1);
}

#[tokio::test]
async fn test_cycle_aborts_before_execution() {
    let executor = Arc::new(ScriptedExecutor::new());
    let scheduler = scheduler(&executor, config(ExecutionStrategy::Sequential));

    let err = scheduler
        .execute_all(vec![task("x", &["y"]), task("y", &["x"]), task("z", &[])])
        .await
        .unwrap_err();

    assert_eq!(
        err,
        SchedulerError::CircularDependency {
            tasks: names(&["x", "y"]),
        }
    );
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn test_total_deadline() {
    let executor = Arc::new(ScriptedExecutor::new().with_delay("slow", 5_000));
    let scheduler = scheduler(
        &executor,
        WaveConfig {
            timeout_total_ms: Some(100),
            ..config(ExecutionStrategy::Sequential)
        },
    );

    let start = Instant::now();
    let err = scheduler.execute_all(vec![task("slow", &[])]).await.unwrap_err();

    assert_eq!(err, SchedulerError::DeadlineExceeded { timeout_ms: 100 });
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_callback_failures_do_not_abort_run() {
    let executor = Arc::new(ScriptedExecutor::new());
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);

    let scheduler = scheduler(&executor, config(ExecutionStrategy::Sequential)).on_task_complete(
        move |result| {
            counter.fetch_add(1, Ordering::SeqCst);
            match result.name.as_str() {
                "a" => anyhow::bail!("observer rejected {}", result.name),
                "b" => panic!("observer crashed"),
                _ => Ok(()),
            }
        },
    );

    let results = scheduler
        .execute_all(vec![task("a", &[]), task("b", &[]), task("c", &["a", "b"])])
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(seen.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_wave_callback_fires_once_per_wave() {
    for strategy in [
        ExecutionStrategy::Sequential,
        ExecutionStrategy::Overlapped,
        ExecutionStrategy::Aggressive,
        ExecutionStrategy::Batched,
    ] {
        let executor = Arc::new(ScriptedExecutor::new());
        let finished = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&finished);

        let scheduler = scheduler(&executor, config(strategy)).on_wave_complete(move |wave| {
            sink.lock().unwrap().push(wave.index);
            Ok(())
        });

        scheduler
            .execute_all(vec![
                task("a", &[]),
                task("b", &["a"]),
                task("c", &["b"]),
            ])
            .await
            .unwrap();

        let mut finished = finished.lock().unwrap().clone();
        finished.sort_unstable();
        assert_eq!(finished, vec![0, 1, 2], "strategy {strategy}");
    }
}

#[tokio::test]
async fn test_scheduler_is_reusable() {
    let executor = Arc::new(ScriptedExecutor::new());
    let scheduler = scheduler(&executor, config(ExecutionStrategy::Sequential));

    scheduler.execute_all(vec![task("a", &[])]).await.unwrap();
    let second = scheduler
        .execute_all(vec![task("b", &[]), task("c", &["b"])])
        .await
        .unwrap();

    assert_eq!(second.len(), 2);
    assert!(!scheduler.completed().contains_key("a"));
    assert_eq!(scheduler.generate_report().waves.len(), 2);
}
