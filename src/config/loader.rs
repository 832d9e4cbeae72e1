//! Reading `conveyor.toml`
//!
//! The text goes through three passes before it is handed out: `${VAR}`
//! references are expanded, `CONVEYOR_<SECTION>_<KEY>` variables override
//! what the file says, and the result is validated.

use super::schema::{ConveyorConfig, PostgreSQLConfig};
use super::secret_string;
use crate::domain::errors::BeltError;
use crate::domain::result::Result;
use regex::{Captures, Regex};
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

/// Load and validate a configuration file
///
/// A missing file is an error here; see [`load_config_or_default`] for the
/// lenient variant the iterating commands use.
///
/// ```no_run
/// use conveyor::config::loader::load_config;
///
/// let config = load_config("conveyor.toml").expect("Failed to load config");
/// assert!(config.belt.chunk_size > 0);
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<ConveyorConfig> {
    let path = path.as_ref();

    let contents = std::fs::read_to_string(path).map_err(|e| {
        BeltError::Configuration(match e.kind() {
            ErrorKind::NotFound => format!("Configuration file not found: {}", path.display()),
            _ => format!("Cannot read {}: {e}", path.display()),
        })
    })?;

    parse_config(&contents)
}

/// Load the file when it exists, otherwise start from defaults
///
/// Environment overrides and validation apply either way.
pub fn load_config_or_default(path: impl AsRef<Path>) -> Result<ConveyorConfig> {
    let path = path.as_ref();
    if path.exists() {
        return load_config(path);
    }

    tracing::debug!(path = %path.display(), "No configuration file, using defaults");
    finish(ConveyorConfig::default())
}

/// Parse configuration from TOML text
pub fn parse_config(contents: &str) -> Result<ConveyorConfig> {
    let expanded = substitute_env_vars(contents)?;
    let config = toml::from_str(&expanded)
        .map_err(|e| BeltError::Configuration(format!("Failed to parse TOML: {e}")))?;
    finish(config)
}

fn finish(mut config: ConveyorConfig) -> Result<ConveyorConfig> {
    apply_env_overrides(&mut config)?;
    config
        .validate()
        .map_err(|e| BeltError::Configuration(format!("Configuration validation failed: {e}")))?;
    Ok(config)
}

/// Expand `${NAME}` outside comment lines
///
/// Every unset name is reported at once.
fn substitute_env_vars(input: &str) -> Result<String> {
    let pattern = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| BeltError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut unset: Vec<String> = Vec::new();
    let mut output = String::with_capacity(input.len());

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            output.push_str(line);
        } else {
            let expanded = pattern.replace_all(line, |caps: &Captures<'_>| {
                let name = &caps[1];
                std::env::var(name).unwrap_or_else(|_| {
                    if !unset.iter().any(|n| n == name) {
                        unset.push(name.to_string());
                    }
                    String::new()
                })
            });
            output.push_str(&expanded);
        }
        output.push('\n');
    }

    if unset.is_empty() {
        Ok(output)
    } else {
        Err(BeltError::Configuration(format!(
            "Missing required environment variables: {}",
            unset.join(", ")
        )))
    }
}

/// Apply `CONVEYOR_<SECTION>_<KEY>` variables
///
/// `CONVEYOR_POSTGRESQL_CONNECTION_STRING` creates the `[postgresql]` section
/// when the file has none. A value that doesn't parse is an error, not a
/// silent fallback.
fn apply_env_overrides(config: &mut ConveyorConfig) -> Result<()> {
    if let Some(level) = env_var("CONVEYOR_APPLICATION_LOG_LEVEL") {
        config.application.log_level = level;
    }

    let belt = &mut config.belt;
    override_with(&mut belt.chunk_size, "CONVEYOR_BELT_CHUNK_SIZE")?;
    override_with(&mut belt.use_transaction, "CONVEYOR_BELT_USE_TRANSACTION")?;
    override_with(&mut belt.collect_exceptions, "CONVEYOR_BELT_COLLECT_EXCEPTIONS")?;

    if let Some(dsn) = env_var("CONVEYOR_POSTGRESQL_CONNECTION_STRING") {
        match config.postgresql {
            Some(ref mut pg) => pg.connection_string = secret_string(dsn),
            None => {
                let section = PostgreSQLConfig::with_connection_string(secret_string(dsn));
                config.postgresql = Some(section);
            }
        }
    }
    if let Some(ref mut pg) = config.postgresql {
        override_with(&mut pg.max_connections, "CONVEYOR_POSTGRESQL_MAX_CONNECTIONS")?;
        override_with(&mut pg.ssl_mode, "CONVEYOR_POSTGRESQL_SSL_MODE")?;
        override_with(
            &mut pg.statement_timeout_seconds,
            "CONVEYOR_POSTGRESQL_STATEMENT_TIMEOUT_SECONDS",
        )?;
    }

    override_with(&mut config.logging.local_enabled, "CONVEYOR_LOGGING_LOCAL_ENABLED")?;
    if let Some(path) = env_var("CONVEYOR_LOGGING_LOCAL_PATH") {
        config.logging.local_path = path;
    }

    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn override_with<T>(target: &mut T, name: &str) -> Result<()>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    if let Some(raw) = env_var(name) {
        *target = raw.trim().parse().map_err(|e| {
            BeltError::Configuration(format!("{name} has an invalid value '{raw}': {e}"))
        })?;
    }
    Ok(())
}
