//! CLI output formatting module
//!
//! Provides various output formatters for terminal display.

pub mod progress;
pub mod table;

pub use progress::ProgressPrinter;
pub use table::TableFormatter;
