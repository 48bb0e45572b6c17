//! Command-line interface: argument types, command handlers and output.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands};

use console::style;

/// Print `err` and exit with status 1.
///
/// In JSON mode the error goes to stdout as `{"error": "..."}` so scripted
/// callers can parse it.
pub fn handle_error(err: anyhow::Error, json: bool) -> ! {
    if json {
        let body = serde_json::json!({ "error": format!("{err:#}") });
        println!("{body}");
    } else {
        eprintln!("{} {err:#}", style("Error:").red().bold());
    }
    std::process::exit(1)
}
