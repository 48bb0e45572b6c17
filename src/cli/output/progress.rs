//! Run progress for `run`.
//!
//! One bar tracks finished tasks; a line per task and wave is printed above
//! it. Everything goes to stderr so `--json` output on stdout stays parseable.

use chrono::Local;
use console::{style, Term};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

use crate::domain::models::{AgentResult, Wave};

const RUN_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}";
const PROGRESS_CHARS: &str = "█▓▒░ ";

/// Progress bar for one run, with a log line per finished task and wave
pub struct ProgressPrinter {
    bar: ProgressBar,
    term: Option<Term>,
}

impl ProgressPrinter {
    /// Bar and lines drawn to stderr.
    pub fn new(total: usize) -> Self {
        let bar = run_bar(total, ProgressDrawTarget::stderr());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self {
            bar,
            term: Some(Term::stderr()),
        }
    }

    /// Counts progress without drawing anything.
    pub fn hidden(total: usize) -> Self {
        Self {
            bar: run_bar(total, ProgressDrawTarget::hidden()),
            term: None,
        }
    }

    pub fn task_finished(&self, result: &AgentResult) -> std::io::Result<()> {
        self.bar.inc(1);
        self.bar.set_message(result.name.clone());
        self.print(&task_line(result))
    }

    pub fn wave_finished(&self, wave: &Wave) -> std::io::Result<()> {
        let line = format!(
            "{} wave {} finished: {} ok, {} failed",
            timestamp(),
            wave.index + 1,
            wave.completed.len(),
            wave.failed.len()
        );
        self.print(&style(line).dim().to_string())
    }

    /// Tasks reported so far.
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self) {
        let done = self.bar.position();
        let total = self.bar.length().unwrap_or(done);
        self.bar
            .finish_with_message(format!("{} {done}/{total} tasks reported", style("✓").green()));
    }

    fn print(&self, line: &str) -> std::io::Result<()> {
        match &self.term {
            Some(term) => self.bar.suspend(|| term.write_line(line)),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ProgressPrinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressPrinter")
            .field("position", &self.bar.position())
            .field("length", &self.bar.length())
            .finish_non_exhaustive()
    }
}

fn run_bar(total: usize, target: ProgressDrawTarget) -> ProgressBar {
    let bar = ProgressBar::with_draw_target(Some(total as u64), target);
    let style = ProgressStyle::default_bar()
        .template(RUN_TEMPLATE)
        .map(|style| style.progress_chars(PROGRESS_CHARS))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

fn timestamp() -> String {
    format!("[{}]", Local::now().format("%H:%M:%S"))
}

/// Render the progress line for one result.
pub fn task_line(result: &AgentResult) -> String {
    if result.success {
        format!(
            "{} {} {} ({}ms, {} tokens, ${:.4})",
            timestamp(),
            style("✓").green(),
            result.name,
            result.duration_ms,
            result.total_tokens(),
            result.cost
        )
    } else {
        format!(
            "{} {} {} ({}ms): {}",
            timestamp(),
            style("✗").red(),
            result.name,
            result.duration_ms,
            result.error.as_deref().unwrap_or("unknown error")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(name: &str) -> AgentResult {
        AgentResult {
            success: true,
            error: None,
            ..AgentResult::failure(name, "haiku", "", 7)
        }
    }

    #[test]
    fn test_task_line() {
        let failed = AgentResult::failure("lint", "haiku", "boom", 7);
        let line = console::strip_ansi_codes(&task_line(&failed)).into_owned();
        assert!(line.ends_with("lint (7ms): boom"));

        let line = console::strip_ansi_codes(&task_line(&ok("lint"))).into_owned();
        assert!(line.contains("lint (7ms, 0 tokens, $0.0000)"));
    }

    #[test]
    fn test_hidden_printer_counts_tasks() {
        let progress = ProgressPrinter::hidden(3);
        assert!(progress.bar.is_hidden());

        progress.task_finished(&ok("a")).unwrap();
        progress
            .task_finished(&AgentResult::failure("b", "haiku", "boom", 1))
            .unwrap();
        progress.wave_finished(&Wave::new(0, Vec::new())).unwrap();

        assert_eq!(progress.position(), 2);
        assert_eq!(progress.bar.length(), Some(3));
        assert_eq!(progress.bar.message(), "b");

        progress.finish();
        assert!(progress.bar.is_finished());
    }
}
