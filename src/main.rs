//! specify-orchestrate CLI entry point.

use clap::Parser;

use specify_orchestrator::cli::commands::{self, plan, run};
use specify_orchestrator::cli::{handle_error, Cli, Commands};
use specify_orchestrator::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match commands::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let mut log_config = config.logging.clone();
    if cli.verbose {
        log_config.level = "debug".to_string();
    }
    let _logger = match LoggerImpl::init(&log_config) {
        Ok(logger) => Some(logger),
        Err(err) => {
            eprintln!("warning: logging disabled: {err:#}");
            None
        }
    };

    let result = match cli.command {
        Commands::Plan(args) => plan::execute(&args, cli.json, &config),
        Commands::Run(args) => run::execute(args, cli.json, config).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
