// Conveyor - Record-by-record batch runner
// Copyright (c) 2025 Conveyor Contributors
// Licensed under the MIT License

use clap::Parser;
use conveyor::cli::{Cli, Commands};
use conveyor::config::{load_config_or_default, ConveyorConfig};
use conveyor::logging::init_logging;
use std::process;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Logging settings come from the file when it loads; commands report
    // configuration errors themselves
    let config = load_config_or_default(&cli.config).unwrap_or_else(|_| ConveyorConfig::default());
    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.application.log_level.clone());

    let guard = match init_logging(&log_level, &config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(2);
        }
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Conveyor");

    let exit_code = match execute_command(&cli).await {
        Ok(code) => code,
        Err(e) => {
            conveyor::log_error_with_context!(e, "Command execution failed");
            eprintln!("Error: {e:#}");
            1
        }
    };

    drop(guard);
    process::exit(exit_code);
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Query(args) => args.execute(&cli.config).await,
        Commands::Json(args) => args.execute(&cli.config).await,
        Commands::ValidateConfig(args) => args.execute(&cli.config).await,
    }
}
