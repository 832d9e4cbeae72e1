//! Configuration management for Conveyor.
//!
//! Conveyor reads an optional TOML file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `CONVEYOR_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level
//! - [`BeltConfig`] - Chunk size and policy defaults for batch runs
//! - [`PostgreSQLConfig`] - Connection pool for query-backed runs
//! - [`LoggingConfig`] - Optional rolling file logs
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [belt]
//! chunk_size = 500
//! collect_exceptions = true
//!
//! [postgresql]
//! connection_string = "${DATABASE_URL}"
//! ssl_mode = "require"
//!
//! [logging]
//! local_enabled = true
//! local_path = "/var/log/conveyor"
//! ```
//!
//! ```rust,no_run
//! use conveyor::config::load_config;
//!
//! # fn example() {
//! match load_config("conveyor.toml") {
//!     Ok(config) => println!("Chunk size: {}", config.belt.chunk_size),
//!     Err(e) => eprintln!("Configuration error: {}", e),
//! }
//! # }
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, load_config_or_default, parse_config};
pub use schema::{
    ApplicationConfig, BeltConfig, ConveyorConfig, LogRotation, LoggingConfig, PostgreSQLConfig,
    SslMode,
};
pub use secret::{redact_connection_string, secret_string, SecretString, SecretValue};
