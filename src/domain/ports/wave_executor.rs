use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::collections::HashMap;

use crate::domain::models::{AgentResult, AgentTask};

/// Port trait for running a set of independent tasks
///
/// The scheduler hands each wave (or batch) to an executor. Executors must
/// yield exactly one [`AgentResult`] per task and must not fail as a whole:
/// per-task errors are reported as failed results.
#[async_trait]
pub trait WaveExecutor: Send + Sync {
    /// Run `tasks`, yielding each result as soon as it is available.
    fn execute_stream(&self, tasks: Vec<AgentTask>) -> BoxStream<'_, AgentResult>;

    /// Run `tasks` and collect the results by task name.
    async fn execute_wave(&self, tasks: Vec<AgentTask>) -> HashMap<String, AgentResult> {
        self.execute_stream(tasks)
            .map(|result| (result.name.clone(), result))
            .collect()
            .await
    }
}
