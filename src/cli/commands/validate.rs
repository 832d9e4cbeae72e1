//! `validate-config` command
//!
//! Loads the configuration file the same way the iterating commands do and
//! prints a summary of the effective settings.

use crate::config::{load_config, redact_connection_string, ConveyorConfig};
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("Configuration is invalid");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        println!("Configuration is valid");
        println!();
        for line in summary(&config) {
            println!("{line}");
        }
        println!();
        Ok(0)
    }
}

fn summary(config: &ConveyorConfig) -> Vec<String> {
    let mut lines = vec![
        "Configuration Summary:".to_string(),
        format!("  Log Level: {}", config.application.log_level),
        format!("  Chunk Size: {}", config.belt.chunk_size),
        format!("  Use Transaction: {}", config.belt.use_transaction),
        format!("  Collect Exceptions: {}", config.belt.collect_exceptions),
    ];

    match config.postgresql {
        Some(ref pg) => {
            lines.push(format!(
                "  PostgreSQL Connection: {}",
                redact_connection_string(pg.connection_string.expose_secret().as_ref())
            ));
            lines.push(format!("  Max Connections: {}", pg.max_connections));
            lines.push(format!("  SSL Mode: {}", pg.ssl_mode));
        }
        None => lines.push("  PostgreSQL: not configured".to_string()),
    }

    if config.logging.local_enabled {
        lines.push(format!(
            "  File Logging: {} ({})",
            config.logging.local_path, config.logging.local_rotation
        ));
    }

    lines
}
