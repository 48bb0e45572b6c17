//! Table output formatting for CLI commands
//!
//! Provides formatted tables for execution plans, run results and pool
//! statistics using comfy-table.

use comfy_table::{presets, Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use std::env;

use crate::domain::models::{AgentResult, ExecutionReport, PoolStatsSnapshot, Wave};

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<usize>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub const fn with_config(use_colors: bool, max_width: Option<usize>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// One row per task, grouped by wave.
    pub fn format_waves(&self, waves: &[Wave]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Wave", "Task", "Model", "Priority", "Depends on"]));

        for wave in waves {
            for (position, task) in wave.tasks.iter().enumerate() {
                let wave_label = if position == 0 {
                    (wave.index + 1).to_string()
                } else {
                    String::new()
                };
                let deps = if task.depends_on.is_empty() {
                    "-".to_string()
                } else {
                    task.depends_on.join(", ")
                };
                table.add_row(vec![
                    Cell::new(wave_label),
                    Cell::new(&task.name),
                    Cell::new(task.tier().as_str()),
                    Cell::new(task.priority).set_alignment(CellAlignment::Right),
                    Cell::new(truncate_text(&deps, 40)),
                ]);
            }
        }

        table.to_string()
    }

    /// Per-task outcome of a run, failures first.
    pub fn format_results(&self, report: &ExecutionReport) -> String {
        let mut results: Vec<&AgentResult> = report.results.values().collect();
        results.sort_by(|a, b| a.success.cmp(&b.success).then_with(|| a.name.cmp(&b.name)));

        let mut table = self.create_base_table();
        table.set_header(header(&["Task", "Status", "Duration", "Tokens", "Cost", "Error"]));

        for result in results {
            table.add_row(vec![
                Cell::new(&result.name),
                self.status_cell(result.success),
                Cell::new(format!("{}ms", result.duration_ms)).set_alignment(CellAlignment::Right),
                Cell::new(result.total_tokens()).set_alignment(CellAlignment::Right),
                Cell::new(format!("${:.4}", result.cost)).set_alignment(CellAlignment::Right),
                Cell::new(truncate_text(result.error.as_deref().unwrap_or("-"), 50)),
            ]);
        }

        table.to_string()
    }

    /// Usage per model tier plus a total row.
    pub fn format_stats(&self, stats: &PoolStatsSnapshot) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&[
            "Tier",
            "Requests",
            "Tokens in",
            "Tokens out",
            "Tokens",
            "Cost",
        ]));

        for (tier, usage) in &stats.by_tier {
            table.add_row(vec![
                Cell::new(tier.as_str()),
                Cell::new(usage.requests).set_alignment(CellAlignment::Right),
                Cell::new(usage.tokens_in).set_alignment(CellAlignment::Right),
                Cell::new(usage.tokens_out).set_alignment(CellAlignment::Right),
                Cell::new(usage.tokens_total).set_alignment(CellAlignment::Right),
                Cell::new(format!("${:.4}", usage.cost)).set_alignment(CellAlignment::Right),
            ]);
        }
        table.add_row(vec![
            Cell::new("total").add_attribute(Attribute::Bold),
            Cell::new(stats.total_requests).set_alignment(CellAlignment::Right),
            Cell::new(stats.total_tokens_in).set_alignment(CellAlignment::Right),
            Cell::new(stats.total_tokens_out).set_alignment(CellAlignment::Right),
            Cell::new(stats.total_tokens).set_alignment(CellAlignment::Right),
            Cell::new(format!("${:.4}", stats.total_cost)).set_alignment(CellAlignment::Right),
        ]);

        format!(
            "{table}\nPool size: {}  Total duration: {}ms  Avg duration: {:.0}ms  Cached results: {}",
            stats.pool_size, stats.total_duration_ms, stats.avg_duration_ms, stats.cached_results
        )
    }

    fn status_cell(&self, success: bool) -> Cell {
        match (success, self.use_colors) {
            (true, true) => Cell::new("ok").fg(Color::Green),
            (false, true) => Cell::new("failed").fg(Color::Red),
            (true, false) => Cell::new("✓ ok"),
            (false, false) => Cell::new("✗ failed"),
        }
    }

    /// Create a base table with common settings
    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width as u16);
        }
        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
        .collect()
}

fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    if env::var("TERM").is_ok_and(|term| term == "dumb") {
        return false;
    }
    console::colors_enabled()
}

/// Truncate to `max_len` characters, appending "..." when shortened.
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{AgentTask, ModelTier, TierUsage};

    fn formatter() -> TableFormatter {
        TableFormatter::with_config(false, Some(120))
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("a longer piece of text", 10), "a longe...");
        assert_eq!(truncate_text("ééééé", 4), "é...");
    }

    #[test]
    fn test_format_waves() {
        let waves = vec![
            Wave::new(0, vec![AgentTask::new("analyze", "p"), AgentTask::new("scan", "p")]),
            Wave::new(
                1,
                vec![AgentTask::new("report", "p").with_dependencies(["analyze", "scan"])],
            ),
        ];
        let out = formatter().format_waves(&waves);
        assert!(out.contains("analyze"));
        assert!(out.contains("analyze, scan"));
        assert!(out.contains("sonnet"));
    }

    #[test]
    fn test_format_results_lists_failures() {
        let mut results = std::collections::HashMap::new();
        results.insert(
            "broken".to_string(),
            AgentResult::failure("broken", "haiku", "rate limited", 12),
        );
        let report = ExecutionReport::new(Vec::new(), results, 12);

        let out = formatter().format_results(&report);
        assert!(out.contains("✗ failed"));
        assert!(out.contains("rate limited"));
    }

    #[test]
    fn test_format_stats() {
        let mut stats = PoolStatsSnapshot {
            total_requests: 2,
            total_cost: 0.5,
            total_duration_ms: 900,
            avg_duration_ms: 450.0,
            pool_size: 4,
            ..PoolStatsSnapshot::default()
        };
        stats.by_tier.insert(
            ModelTier::Opus,
            TierUsage {
                requests: 2,
                tokens_in: 100,
                tokens_out: 50,
                tokens_total: 150,
                cost: 0.5,
            },
        );

        let out = formatter().format_stats(&stats);
        assert!(out.contains("opus"));
        assert!(out.contains("$0.5000"));
        assert!(out.contains("Pool size: 4"));
        assert!(out.contains("Total duration: 900ms"));
        assert!(out.contains("Avg duration: 450ms"));
    }
}
