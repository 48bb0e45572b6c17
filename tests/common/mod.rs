//! Common test utilities for integration tests
//!
//! Provides a scripted [`WaveExecutor`] that records what it was asked to
//! run and when, plus small task-building helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{BoxStream, FuturesUnordered, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use specify_orchestrator::domain::models::{AgentResult, AgentTask};
use specify_orchestrator::domain::ports::WaveExecutor;

/// Executor with per-task delays and failures
///
/// Every `execute_stream` call is recorded as the list of task names it was
/// given, and each task's start and finish instants are kept.
#[derive(Default)]
pub struct ScriptedExecutor {
    delays: HashMap<String, u64>,
    failures: HashSet<String>,
    calls: Mutex<Vec<Vec<String>>>,
    started: Mutex<HashMap<String, Instant>>,
    finished: Mutex<HashMap<String, Instant>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `name` take `ms` milliseconds.
    pub fn with_delay(mut self, name: &str, ms: u64) -> Self {
        self.delays.insert(name.to_string(), ms);
        self
    }

    /// Make `name` fail.
    pub fn failing(mut self, name: &str) -> Self {
        self.failures.insert(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn executed(&self) -> HashSet<String> {
        self.calls().into_iter().flatten().collect()
    }

    pub fn started_at(&self, name: &str) -> Instant {
        self.started.lock().unwrap()[name]
    }

    pub fn finished_at(&self, name: &str) -> Instant {
        self.finished.lock().unwrap()[name]
    }

    async fn run(&self, task: AgentTask) -> AgentResult {
        self.started
            .lock()
            .unwrap()
            .insert(task.name.clone(), Instant::now());

        let delay = self.delays.get(&task.name).copied().unwrap_or(5);
        tokio::time::sleep(Duration::from_millis(delay)).await;

        self.finished
            .lock()
            .unwrap()
            .insert(task.name.clone(), Instant::now());

        if self.failures.contains(&task.name) {
            AgentResult::failure(&task.name, &task.model, "scripted failure", delay)
        } else {
            AgentResult {
                success: true,
                error: None,
                output: format!("done: {}", task.name),
                tokens_in: 10,
                tokens_out: 20,
                ..AgentResult::failure(&task.name, &task.model, "", delay)
            }
        }
    }
}

#[async_trait]
impl WaveExecutor for ScriptedExecutor {
    fn execute_stream(&self, tasks: Vec<AgentTask>) -> BoxStream<'_, AgentResult> {
        self.calls
            .lock()
            .unwrap()
            .push(tasks.iter().map(|t| t.name.clone()).collect());

        tasks
            .into_iter()
            .map(|task| self.run(task))
            .collect::<FuturesUnordered<_>>()
            .boxed()
    }
}

pub fn task(name: &str, deps: &[&str]) -> AgentTask {
    AgentTask::new(name, format!("Do {name}")).with_dependencies(deps.iter().copied())
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
