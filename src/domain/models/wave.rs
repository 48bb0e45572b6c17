//! Waves and batch groups.
//!
//! A [`Wave`] is a set of tasks whose dependencies all sit in earlier waves.
//! A [`BatchGroup`] is the aggregator's regrouping of those tasks by true
//! dependency level.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::result::AgentResult;
use super::task::AgentTask;

/// A group of tasks that may run concurrently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wave {
    /// Position in the execution order (0-based)
    pub index: usize,

    /// Tasks in this wave, in priority order
    pub tasks: Vec<AgentTask>,

    /// Names of tasks that finished successfully
    #[serde(default)]
    pub completed: BTreeSet<String>,

    /// Names of tasks that finished with a failure
    #[serde(default)]
    pub failed: BTreeSet<String>,

    /// Whether any task of the wave has been dispatched
    #[serde(default)]
    pub started: bool,

    /// Whether every task of the wave has reported
    #[serde(default)]
    pub finished: bool,
}

impl Wave {
    pub fn new(index: usize, tasks: Vec<AgentTask>) -> Self {
        Self {
            index,
            tasks,
            completed: BTreeSet::new(),
            failed: BTreeSet::new(),
            started: false,
            finished: false,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.iter().any(|t| t.name == name)
    }

    /// Number of tasks that have reported, successfully or not.
    pub fn settled(&self) -> usize {
        self.completed.len() + self.failed.len()
    }

    /// Fraction of tasks that have reported. An empty wave counts as done.
    pub fn completion_ratio(&self) -> f64 {
        if self.tasks.is_empty() {
            return 1.0;
        }
        self.settled() as f64 / self.tasks.len() as f64
    }

    pub fn is_threshold_met(&self, threshold: f64) -> bool {
        self.completion_ratio() >= threshold
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty() && self.completed.len() == self.tasks.len()
    }

    /// Record a result for one of this wave's tasks.
    ///
    /// Returns `false` when the task does not belong to the wave.
    pub fn record(&mut self, result: &AgentResult) -> bool {
        if !self.contains(&result.name) {
            return false;
        }
        if result.success {
            self.failed.remove(&result.name);
            self.completed.insert(result.name.clone());
        } else {
            self.completed.remove(&result.name);
            self.failed.insert(result.name.clone());
        }
        if self.settled() >= self.tasks.len() {
            self.finished = true;
        }
        true
    }
}

/// Tasks regrouped by true dependency level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchGroup {
    /// Tasks in this batch, in priority order
    pub tasks: Vec<AgentTask>,

    /// Original waves the tasks came from
    pub wave_indices: BTreeSet<usize>,

    /// Topological level of every task in the batch
    pub dependency_level: usize,
}

impl BatchGroup {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }

    /// Whether the batch merges tasks from more than one original wave.
    pub fn is_cross_wave(&self) -> bool {
        self.wave_indices.len() > 1
    }
}
