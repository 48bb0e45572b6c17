//! Batch aggregation across wave boundaries.
//!
//! Waves are built greedily and capped by `max_parallel`, so a task can land
//! in a later wave even though nothing it depends on sits in the wave before
//! it. The aggregator regroups tasks by their true dependency level, which
//! removes those artificial boundaries.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::domain::errors::{SchedulerError, SchedulerResult};
use crate::domain::models::{AgentTask, BatchConfig, BatchGroup, CyclePolicy, Wave};

/// Summary of one aggregation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationStats {
    pub original_waves: usize,
    pub aggregated_batches: usize,
    pub total_tasks: usize,
    /// Percentage of execution boundaries removed, rounded to one decimal
    pub boundary_reduction_pct: f64,
    pub avg_batch_size: f64,
    /// Tasks sitting in a batch that merges several original waves
    pub cross_wave_tasks: usize,
}

/// Regroups waves into dependency-level batches
#[derive(Debug, Clone, Default)]
pub struct BatchAggregator {
    config: BatchConfig,
}

impl BatchAggregator {
    pub const fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Group the tasks of `waves` into batches in execution order.
    ///
    /// Dependencies on names outside the waves are ignored. With the
    /// aggregator disabled every non-empty wave becomes one batch.
    ///
    /// # Errors
    /// `CircularDependency` when levels cannot be resolved and the cycle
    /// policy is [`CyclePolicy::Fail`].
    pub fn aggregate(&self, waves: &[Wave]) -> SchedulerResult<Vec<BatchGroup>> {
        if !self.config.enabled {
            return Ok(waves_to_batches(waves));
        }

        let entries: Vec<(&AgentTask, usize)> = waves
            .iter()
            .flat_map(|wave| wave.tasks.iter().map(move |task| (task, wave.index)))
            .collect();
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let levels = self.compute_levels(&entries)?;
        let max_batch_size = self.config.max_batch_size.max(1);

        if !self.config.cross_wave_batching {
            return Ok(waves
                .iter()
                .filter(|wave| !wave.is_empty())
                .flat_map(|wave| {
                    let mut tasks: Vec<(&AgentTask, usize)> =
                        wave.tasks.iter().map(|task| (task, wave.index)).collect();
                    tasks.sort_by_key(|(task, _)| task.priority);
                    let level = tasks
                        .iter()
                        .map(|(task, _)| levels[task.name.as_str()])
                        .max()
                        .unwrap_or_default();
                    chunk(&tasks, max_batch_size, level)
                })
                .collect());
        }

        let mut by_level: BTreeMap<usize, Vec<(&AgentTask, usize)>> = BTreeMap::new();
        for &(task, wave_index) in &entries {
            by_level
                .entry(levels[task.name.as_str()])
                .or_default()
                .push((task, wave_index));
        }

        let batches = by_level
            .into_iter()
            .flat_map(|(level, mut tasks)| {
                tasks.sort_by_key(|(task, _)| task.priority);
                chunk(&tasks, max_batch_size, level)
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            waves = waves.len(),
            batches = batches.len(),
            tasks = entries.len(),
            "aggregated waves into batches"
        );
        Ok(batches)
    }

    fn compute_levels<'a>(
        &self,
        entries: &[(&'a AgentTask, usize)],
    ) -> SchedulerResult<HashMap<&'a str, usize>> {
        let names: HashSet<&str> = entries.iter().map(|&(t, _)| t.name.as_str()).collect();
        let deps: HashMap<&'a str, Vec<&'a str>> = entries
            .iter()
            .map(|&(task, _)| {
                let pruned = task
                    .depends_on
                    .iter()
                    .map(String::as_str)
                    .filter(|dep| names.contains(dep))
                    .collect();
                (task.name.as_str(), pruned)
            })
            .collect();

        let mut levels: HashMap<&'a str, usize> = HashMap::with_capacity(entries.len());
        let mut remaining: Vec<&'a str> = entries.iter().map(|&(t, _)| t.name.as_str()).collect();
        let mut round = 0;

        while !remaining.is_empty() {
            let ready: Vec<&'a str> = remaining
                .iter()
                .copied()
                .filter(|name| deps[name].iter().all(|dep| levels.contains_key(dep)))
                .collect();

            if ready.is_empty() {
                match self.config.cycle_policy {
                    CyclePolicy::Fail => {
                        let mut tasks: Vec<String> =
                            remaining.iter().map(ToString::to_string).collect();
                        tasks.sort();
                        return Err(SchedulerError::CircularDependency { tasks });
                    }
                    CyclePolicy::Degrade => {
                        tracing::warn!(
                            tasks = ?remaining,
                            level = round,
                            "unresolvable dependencies, placing remaining tasks on one level"
                        );
                        for name in remaining.drain(..) {
                            levels.insert(name, round);
                        }
                        break;
                    }
                }
            }

            for name in ready {
                let level = deps[name]
                    .iter()
                    .map(|dep| levels[dep] + 1)
                    .max()
                    .unwrap_or(0);
                levels.insert(name, level);
            }
            remaining.retain(|name| !levels.contains_key(name));
            round += 1;
        }

        Ok(levels)
    }

    /// Whether neither task depends on the other.
    pub fn can_batch_together(a: &AgentTask, b: &AgentTask) -> bool {
        !a.depends_on_task(&b.name) && !b.depends_on_task(&a.name)
    }

    pub fn aggregation_stats(waves: &[Wave], batches: &[BatchGroup]) -> AggregationStats {
        let original_waves = waves.len();
        let aggregated_batches = batches.len();
        let total_tasks: usize = batches.iter().map(BatchGroup::len).sum();

        let boundary_reduction_pct = if original_waves == 0 {
            0.0
        } else {
            let pct = (1.0 - aggregated_batches as f64 / original_waves as f64) * 100.0;
            (pct * 10.0).round() / 10.0
        };
        let avg_batch_size = if aggregated_batches == 0 {
            0.0
        } else {
            total_tasks as f64 / aggregated_batches as f64
        };

        AggregationStats {
            original_waves,
            aggregated_batches,
            total_tasks,
            boundary_reduction_pct,
            avg_batch_size,
            cross_wave_tasks: batches
                .iter()
                .filter(|b| b.is_cross_wave())
                .map(BatchGroup::len)
                .sum(),
        }
    }
}

fn waves_to_batches(waves: &[Wave]) -> Vec<BatchGroup> {
    waves
        .iter()
        .filter(|wave| !wave.is_empty())
        .map(|wave| BatchGroup {
            tasks: wave.tasks.clone(),
            wave_indices: BTreeSet::from([wave.index]),
            dependency_level: wave.index,
        })
        .collect()
}

fn chunk(tasks: &[(&AgentTask, usize)], size: usize, level: usize) -> Vec<BatchGroup> {
    tasks
        .chunks(size)
        .map(|part| BatchGroup {
            tasks: part.iter().map(|(task, _)| (*task).clone()).collect(),
            wave_indices: part.iter().map(|(_, wave)| *wave).collect(),
            dependency_level: level,
        })
        .collect()
}
