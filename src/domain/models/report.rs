use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;

use super::result::AgentResult;
use super::wave::Wave;

/// Summary of one scheduling run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Waves as built for the run, with their final state
    pub waves: Vec<Wave>,

    /// Results keyed by task name
    pub results: HashMap<String, AgentResult>,

    /// Wall-clock duration of the run
    pub total_duration_ms: u64,

    /// True when no task failed
    pub success: bool,

    /// Failed task names, sorted
    pub failed_tasks: Vec<String>,
}

impl ExecutionReport {
    pub fn new(waves: Vec<Wave>, results: HashMap<String, AgentResult>, total_duration_ms: u64) -> Self {
        let mut failed_tasks: Vec<String> = results
            .values()
            .filter(|r| !r.success)
            .map(|r| r.name.clone())
            .collect();
        failed_tasks.sort();

        Self {
            success: failed_tasks.is_empty(),
            waves,
            results,
            total_duration_ms,
            failed_tasks,
        }
    }

    pub fn total_cost(&self) -> f64 {
        self.results.values().map(|r| r.cost).sum()
    }

    pub fn total_tokens(&self) -> u64 {
        self.results.values().map(AgentResult::total_tokens).sum()
    }

    /// Plain-text rendering of the report.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let status = if self.success { "succeeded" } else { "FAILED" };
        let _ = writeln!(out, "Execution {status}");
        let _ = writeln!(out, "  Waves: {}", self.waves.len());
        let _ = writeln!(out, "  Tasks: {}", self.results.len());
        let _ = write!(out, "  Duration: {}ms", self.total_duration_ms);
        if !self.failed_tasks.is_empty() {
            let _ = write!(out, "\n  Failed: {}", self.failed_tasks.join(", "));
        }
        out
    }
}
