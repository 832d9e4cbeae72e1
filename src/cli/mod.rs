//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Conveyor using clap.

pub mod commands;
pub mod flags;

pub use flags::BeltFlags;

use clap::{Parser, Subcommand};

/// Conveyor - record-by-record batch runner
#[derive(Parser, Debug)]
#[command(name = "conveyor")]
#[command(version, about, long_about = None)]
#[command(author = "Conveyor Contributors")]
pub struct Cli {
    /// Path to configuration file (optional; defaults apply when missing)
    #[arg(short, long, default_value = "conveyor.toml", env = "CONVEYOR_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "CONVEYOR_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a statement for every row a PostgreSQL query returns
    Query(commands::query::QueryArgs),

    /// Check and normalize every object of a JSON array
    Json(commands::json::JsonArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_query() {
        let cli = Cli::parse_from(["conveyor", "query", "--select", "select * from users"]);
        assert_eq!(cli.config, "conveyor.toml");
        match cli.command {
            Commands::Query(args) => assert_eq!(args.select, "select * from users"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["conveyor", "--config", "custom.toml", "validate-config"]);
        assert_eq!(cli.config, "custom.toml");
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["conveyor", "--log-level", "debug", "json", "users.json"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_run_flags() {
        let cli = Cli::parse_from([
            "conveyor",
            "json",
            "users.json",
            "--step",
            "--diff",
            "--dump-sql",
        ]);
        let Commands::Json(args) = cli.command else {
            panic!("expected the json command");
        };
        assert!(args.flags.step);
        assert!(args.flags.diff);
        assert!(args.flags.dump_sql);
        assert!(!args.flags.log_sql);
    }

    #[test]
    fn test_query_requires_select() {
        assert!(Cli::try_parse_from(["conveyor", "query"]).is_err());
    }
}
