//! Wave-based DAG scheduling.
//!
//! Tasks are grouped into waves whose dependencies all sit in earlier waves,
//! then executed with one of four strategies. All orchestration runs inside
//! the caller's task: waves are cooperative futures joined together, so run
//! state is never mutated concurrently and its lock is never held across an
//! await point.

use futures::future::try_join_all;
use futures::stream::{self, BoxStream, SelectAll, StreamExt};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::errors::{SchedulerError, SchedulerResult};
use crate::domain::models::{
    AgentResult, AgentTask, ExecutionReport, ExecutionStrategy, Wave, WaveConfig,
};
use crate::domain::ports::WaveExecutor;
use crate::services::batch_aggregator::BatchAggregator;
use crate::services::circuit_breaker::EarlyUnlockBreaker;
use crate::services::tdd_verifier::{TddVerifier, VerificationResult};

/// Observer called for every task result
pub type TaskCallback = Arc<dyn Fn(&AgentResult) -> anyhow::Result<()> + Send + Sync>;

/// Observer called once per finished wave
pub type WaveCallback = Arc<dyn Fn(&Wave) -> anyhow::Result<()> + Send + Sync>;

/// Mutable state of the current (or last) run
#[derive(Debug, Default)]
struct RunState {
    waves: Vec<Wave>,
    results: HashMap<String, AgentResult>,
    wave_of: HashMap<String, usize>,
    dispatched: HashSet<String>,
    /// Waves whose own driver has dispatched them
    driven: HashSet<usize>,
    breaker: EarlyUnlockBreaker,
    duration_ms: u64,
}

enum RunEvent {
    Finished(AgentResult),
    Verified {
        task: String,
        outcome: SchedulerResult<VerificationResult>,
    },
}

/// Whether the gate after wave `index` is open for its successor.
///
/// The wave's own driver must have dispatched it: tasks unlocked early do
/// not open the gate on their own. A threshold of zero still requires one
/// reported task.
fn gate_open(state: &RunState, index: usize, threshold: f64) -> bool {
    let wave = &state.waves[index];
    state.driven.contains(&index)
        && (wave.finished
            || wave.is_empty()
            || (wave.settled() > 0 && wave.is_threshold_met(threshold)))
}

fn format_names(names: &[&str]) -> String {
    format!("[{}]", names.join(", "))
}

/// Group `tasks` into waves.
///
/// Ready tasks are ordered by priority (stable on input order) and at most
/// `max_parallel` of them form the next wave. A later task with a duplicate
/// name replaces the earlier one.
///
/// # Errors
/// `CircularDependency` naming every task that cannot be placed, which
/// includes tasks depending on unknown names.
pub fn build_waves(tasks: &[AgentTask], max_parallel: usize) -> SchedulerResult<Vec<Wave>> {
    let max_parallel = max_parallel.max(1);

    let mut by_name: HashMap<&str, &AgentTask> = HashMap::with_capacity(tasks.len());
    let mut order: Vec<&str> = Vec::with_capacity(tasks.len());
    for task in tasks {
        if by_name.insert(task.name.as_str(), task).is_none() {
            order.push(task.name.as_str());
        }
    }
    let mut remaining: Vec<&AgentTask> = order.iter().map(|name| by_name[name]).collect();

    let mut placed: HashSet<&str> = HashSet::with_capacity(remaining.len());
    let mut waves = Vec::new();

    while !remaining.is_empty() {
        let mut ready: Vec<&AgentTask> = remaining
            .iter()
            .copied()
            .filter(|task| task.depends_on.iter().all(|dep| placed.contains(dep.as_str())))
            .collect();

        if ready.is_empty() {
            let mut stuck: Vec<String> = remaining.iter().map(|t| t.name.clone()).collect();
            stuck.sort();
            return Err(SchedulerError::CircularDependency { tasks: stuck });
        }

        ready.sort_by_key(|task| task.priority);
        ready.truncate(max_parallel);

        placed.extend(ready.iter().map(|task| task.name.as_str()));
        remaining.retain(|task| !placed.contains(task.name.as_str()));
        waves.push(Wave::new(waves.len(), ready.into_iter().cloned().collect()));
    }

    debug!(tasks = order.len(), waves = waves.len(), "built waves");
    Ok(waves)
}

/// Render waves as a plain-text execution plan.
pub fn render_plan(waves: &[Wave]) -> String {
    let mut out = format!("Execution Plan ({} waves):\n", waves.len());
    for wave in waves {
        let _ = write!(
            out,
            "\n  Wave {}: {}",
            wave.index + 1,
            format_names(&wave.task_names())
        );
        for task in &wave.tasks {
            let _ = write!(out, "\n    - {}", task.name);
            if !task.depends_on.is_empty() {
                let deps: Vec<&str> = task.depends_on.iter().map(String::as_str).collect();
                let _ = write!(out, " (depends on: {})", format_names(&deps));
            }
        }
    }
    out
}

/// Dependency-aware scheduler driving a [`WaveExecutor`]
///
/// One run at a time: the results of the last run stay available through
/// [`completed`](Self::completed) and
/// [`generate_report`](Self::generate_report) until the next
/// [`execute_all`](Self::execute_all).
pub struct WaveScheduler {
    executor: Arc<dyn WaveExecutor>,
    config: WaveConfig,
    verifier: Option<Arc<TddVerifier>>,
    max_early_unlocks: usize,
    on_task_complete: Option<TaskCallback>,
    on_wave_complete: Option<WaveCallback>,
    state: Mutex<RunState>,
    progress: watch::Sender<u64>,
}

impl WaveScheduler {
    pub fn new(executor: Arc<dyn WaveExecutor>, config: WaveConfig) -> Self {
        let (progress, _) = watch::channel(0);
        Self {
            executor,
            config,
            verifier: None,
            max_early_unlocks: 0,
            on_task_complete: None,
            on_wave_complete: None,
            state: Mutex::new(RunState::default()),
            progress,
        }
    }

    /// Verify tests written by test tasks and unlock their dependents early.
    ///
    /// Applies to the sequential, overlapped and aggressive strategies.
    #[must_use]
    pub fn with_tdd_verifier(mut self, verifier: TddVerifier) -> Self {
        self.max_early_unlocks = verifier.config().max_early_unlocks_per_wave as usize;
        self.verifier = Some(Arc::new(verifier));
        self
    }

    #[must_use]
    pub fn on_task_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&AgentResult) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_task_complete = Some(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn on_wave_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Wave) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_wave_complete = Some(Arc::new(callback));
        self
    }

    pub const fn config(&self) -> &WaveConfig {
        &self.config
    }

    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Group `tasks` into waves of at most `max_parallel` tasks.
    ///
    /// See [`build_waves`].
    pub fn build_waves(&self, tasks: &[AgentTask]) -> SchedulerResult<Vec<Wave>> {
        build_waves(tasks, self.config.max_parallel)
    }

    /// Dry-run rendering of the waves `tasks` would run in.
    pub fn get_execution_plan(&self, tasks: &[AgentTask]) -> SchedulerResult<String> {
        Ok(render_plan(&self.build_waves(tasks)?))
    }

    /// Run every task, returning results by task name.
    ///
    /// # Errors
    /// * `CircularDependency` before anything runs
    /// * `WaveFailed` / `BatchFailed` when `fail_fast` trips
    /// * `TddViolation` when a new test passes and blocking is enabled
    /// * `DeadlineExceeded` when `timeout_total_ms` elapses
    ///
    /// Results recorded before an error stay available via
    /// [`completed`](Self::completed).
    #[instrument(skip_all, fields(tasks = tasks.len(), strategy = %self.config.strategy))]
    pub async fn execute_all(
        &self,
        tasks: Vec<AgentTask>,
    ) -> SchedulerResult<HashMap<String, AgentResult>> {
        let start = Instant::now();
        let waves = self.build_waves(&tasks)?;
        let wave_count = waves.len();
        self.reset(waves);
        info!(waves = wave_count, "starting run");

        let run = self.run_strategy();
        let outcome = match self.config.timeout_total_ms {
            Some(timeout_ms) => tokio::time::timeout(Duration::from_millis(timeout_ms), run)
                .await
                .unwrap_or(Err(SchedulerError::DeadlineExceeded { timeout_ms })),
            None => run.await,
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let completed = {
            let mut state = self.lock_state();
            state.duration_ms = duration_ms;
            state.results.len()
        };

        match outcome {
            Ok(()) => {
                info!(duration_ms, completed, "run finished");
                Ok(self.completed())
            }
            Err(err) => {
                error!(duration_ms, completed, error = %err, "run aborted");
                Err(err)
            }
        }
    }

    /// Results recorded by the current or last run.
    pub fn completed(&self) -> HashMap<String, AgentResult> {
        self.lock_state().results.clone()
    }

    /// Waves of the current or last run with their progress.
    pub fn waves(&self) -> Vec<Wave> {
        self.lock_state().waves.clone()
    }

    /// Tasks dispatched ahead of their wave so far.
    pub fn early_unlocks(&self) -> usize {
        self.lock_state().breaker.total_unlocks()
    }

    pub fn generate_report(&self) -> ExecutionReport {
        let state = self.lock_state();
        ExecutionReport::new(state.waves.clone(), state.results.clone(), state.duration_ms)
    }

    fn reset(&self, waves: Vec<Wave>) {
        let mut state = self.lock_state();
        *state = RunState {
            wave_of: waves
                .iter()
                .flat_map(|w| w.tasks.iter().map(move |t| (t.name.clone(), w.index)))
                .collect(),
            waves,
            breaker: EarlyUnlockBreaker::new(self.max_early_unlocks),
            ..RunState::default()
        };
    }

    async fn run_strategy(&self) -> SchedulerResult<()> {
        match self.config.strategy {
            ExecutionStrategy::Sequential => self.run_sequential().await,
            ExecutionStrategy::Overlapped | ExecutionStrategy::Aggressive => {
                self.run_overlapped().await
            }
            ExecutionStrategy::Batched => self.run_batched().await,
        }
    }

    async fn run_sequential(&self) -> SchedulerResult<()> {
        let count = self.lock_state().waves.len();
        for index in 0..count {
            self.drive_wave(index).await?;

            if self.config.fail_fast {
                if let Some(err) = self.wave_failure(index) {
                    warn!(wave = index, "fail-fast: stopping after failed wave");
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    async fn run_overlapped(&self) -> SchedulerResult<()> {
        let threshold = self.config.effective_threshold();
        let count = self.lock_state().waves.len();

        let drivers = (0..count).map(|index| async move {
            if index > 0 {
                self.wait_until(|state| gate_open(state, index - 1, threshold))
                    .await;
                debug!(wave = index, threshold, "predecessor gate open");
            }
            self.drive_wave(index).await
        });
        try_join_all(drivers).await?;

        if self.config.fail_fast {
            if let Some(err) = (0..count).find_map(|index| self.wave_failure(index)) {
                return Err(err);
            }
        }
        Ok(())
    }

    async fn run_batched(&self) -> SchedulerResult<()> {
        let waves = self.waves();
        let batches = BatchAggregator::new(self.config.batch_config()).aggregate(&waves)?;
        let stats = BatchAggregator::aggregation_stats(&waves, &batches);
        info!(
            waves = stats.original_waves,
            batches = stats.aggregated_batches,
            reduction_pct = stats.boundary_reduction_pct,
            cross_wave_tasks = stats.cross_wave_tasks,
            "aggregated waves into batches"
        );

        for (number, batch) in batches.into_iter().enumerate() {
            {
                let mut state = self.lock_state();
                for &index in &batch.wave_indices {
                    state.waves[index].started = true;
                }
                for task in &batch.tasks {
                    state.dispatched.insert(task.name.clone());
                }
            }
            debug!(batch = number, tasks = batch.len(), level = batch.dependency_level, "batch started");

            let mut failed = Vec::new();
            let mut results = self.executor.execute_stream(batch.tasks);
            while let Some(result) = results.next().await {
                if !result.success {
                    failed.push(result.name.clone());
                }
                self.record_result(&result);
            }

            if self.config.fail_fast && !failed.is_empty() {
                failed.sort();
                warn!(batch = number, failed = ?failed, "fail-fast: stopping after failed batch");
                return Err(SchedulerError::BatchFailed { failed });
            }
        }
        Ok(())
    }

    /// Run the not yet dispatched tasks of wave `index` plus anything they
    /// unlock early, then wait until every task of the wave has reported.
    async fn drive_wave(&self, index: usize) -> SchedulerResult<()> {
        let tasks = self.start_wave(index);
        debug!(wave = index, tasks = tasks.len(), "wave started");

        let mut events: SelectAll<BoxStream<'_, RunEvent>> = SelectAll::new();
        if !tasks.is_empty() {
            events.push(self.executor.execute_stream(tasks).map(RunEvent::Finished).boxed());
        }

        while let Some(event) = events.next().await {
            match event {
                RunEvent::Finished(result) => {
                    let task = self.record_result(&result);
                    if let (Some(verifier), Some(task)) = (&self.verifier, task) {
                        if TddVerifier::should_verify(&task, &result) {
                            let verifier = Arc::clone(verifier);
                            events.push(
                                stream::once(async move {
                                    let outcome = verifier.verify(&task, &result).await;
                                    RunEvent::Verified {
                                        task: task.name,
                                        outcome,
                                    }
                                })
                                .boxed(),
                            );
                        }
                    }
                }
                RunEvent::Verified { task, outcome } => {
                    let verification = outcome?;
                    info!(
                        task = %task,
                        status = verification.status.as_str(),
                        "test verification finished"
                    );
                    if verification.allows_unlock() {
                        let unlocked = self.claim_early_unlocks(&task);
                        if !unlocked.is_empty() {
                            events.push(
                                self.executor
                                    .execute_stream(unlocked)
                                    .map(RunEvent::Finished)
                                    .boxed(),
                            );
                        }
                    }
                }
            }
        }

        self.wait_until(|state| state.waves[index].finished).await;
        debug!(wave = index, "wave finished");
        Ok(())
    }

    /// Mark wave `index` driven and claim its undispatched tasks.
    fn start_wave(&self, index: usize) -> Vec<AgentTask> {
        let tasks: Vec<AgentTask> = {
            let mut guard = self.lock_state();
            let state = &mut *guard;
            state.driven.insert(index);
            let wave = &mut state.waves[index];
            wave.started = true;
            wave.tasks
                .iter()
                .filter(|task| state.dispatched.insert(task.name.clone()))
                .cloned()
                .collect()
        };
        // Successors may be waiting on this wave's gate.
        self.progress.send_modify(|n| *n += 1);
        tasks
    }

    /// Claim the undispatched dependents of `test_task` whose other
    /// dependencies have all reported, within the breaker's limit.
    fn claim_early_unlocks(&self, test_task: &str) -> Vec<AgentTask> {
        let mut state = self.lock_state();
        let Some(&source) = state.wave_of.get(test_task) else {
            return Vec::new();
        };

        let candidates: Vec<AgentTask> = state
            .waves
            .iter()
            .flat_map(|wave| wave.tasks.iter())
            .filter(|task| {
                !state.dispatched.contains(&task.name)
                    && task.depends_on_task(test_task)
                    && task
                        .depends_on
                        .iter()
                        .filter(|dep| *dep != test_task)
                        .all(|dep| state.results.contains_key(dep.as_str()))
            })
            .cloned()
            .collect();

        let mut unlocked = Vec::with_capacity(candidates.len());
        for task in candidates {
            if !state.breaker.allows(source) {
                info!(
                    wave = source,
                    skipped = %task.name,
                    "early unlock limit reached, task waits for its wave"
                );
                break;
            }
            state.breaker.record_unlock(source);
            state.dispatched.insert(task.name.clone());
            if let Some(&target) = state.wave_of.get(&task.name) {
                state.waves[target].started = true;
                info!(
                    task = %task.name,
                    test_task,
                    wave = target,
                    unlocks = state.breaker.unlock_count(source),
                    "dispatching task early"
                );
            }
            unlocked.push(task);
        }
        unlocked
    }

    /// Store a result, update its wave and notify observers.
    ///
    /// Returns the task the result belongs to.
    fn record_result(&self, result: &AgentResult) -> Option<AgentTask> {
        let (task, finished_wave) = {
            let mut state = self.lock_state();
            state.results.insert(result.name.clone(), result.clone());
            match state.wave_of.get(&result.name).copied() {
                Some(index) => {
                    let wave = &mut state.waves[index];
                    let was_finished = wave.finished;
                    wave.record(result);
                    let task = wave.tasks.iter().find(|t| t.name == result.name).cloned();
                    let finished = (!was_finished && wave.finished).then(|| wave.clone());
                    (task, finished)
                }
                None => (None, None),
            }
        };

        if result.success {
            debug!(task = %result.name, duration_ms = result.duration_ms, "task completed");
        } else {
            warn!(task = %result.name, error = ?result.error, "task failed");
        }

        self.progress.send_modify(|n| *n += 1);
        self.notify_task(result);
        if let Some(wave) = finished_wave {
            self.notify_wave(&wave);
        }
        task
    }

    fn wave_failure(&self, index: usize) -> Option<SchedulerError> {
        let state = self.lock_state();
        let wave = &state.waves[index];
        (!wave.failed.is_empty()).then(|| SchedulerError::WaveFailed {
            index,
            failed: wave.failed.iter().cloned().collect(),
        })
    }

    /// Suspend until `ready` holds for the run state.
    async fn wait_until(&self, ready: impl Fn(&RunState) -> bool) {
        let mut progress = self.progress.subscribe();
        // The sender lives as long as `self`, so this only returns once `ready` holds.
        let _ = progress.wait_for(|_| ready(&self.lock_state())).await;
    }

    fn notify_task(&self, result: &AgentResult) {
        let Some(callback) = &self.on_task_complete else {
            return;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| callback(result))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(task = %result.name, error = %err, "task callback failed"),
            Err(_) => warn!(task = %result.name, "task callback panicked"),
        }
    }

    fn notify_wave(&self, wave: &Wave) {
        info!(
            wave = wave.index,
            completed = wave.completed.len(),
            failed = wave.failed.len(),
            "wave complete"
        );
        let Some(callback) = &self.on_wave_complete else {
            return;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| callback(wave))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(wave = wave.index, error = %err, "wave callback failed"),
            Err(_) => warn!(wave = wave.index, "wave callback panicked"),
        }
    }
}

impl std::fmt::Debug for WaveScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaveScheduler")
            .field("config", &self.config)
            .field("tdd", &self.verifier.is_some())
            .finish_non_exhaustive()
    }
}
