//! Diagnostics for operators
//!
//! Everything here goes through `tracing` to stderr and, when configured, to
//! rolling JSON files. What a run prints for the person driving it (progress,
//! prompts, failure lists) goes through [`crate::core::console`] instead.
//!
//! ```no_run
//! use conveyor::config::LoggingConfig;
//! use conveyor::logging::init_logging;
//!
//! let _guard = init_logging("debug", &LoggingConfig::default()).expect("logging");
//! tracing::debug!(target: "conveyor", "Ready");
//! ```

pub mod structured;

pub use structured::{init_logging, parse_log_level, LoggingGuard};

/// Debug event for each chunk the runner pulls from its source
///
/// ```no_run
/// conveyor::log_chunk_fetched!(0, 1000, 0, 2500);
/// ```
#[macro_export]
macro_rules! log_chunk_fetched {
    ($index:expr, $records:expr, $completed:expr, $total:expr) => {
        tracing::debug!(
            chunk = $index,
            records = $records,
            completed = $completed,
            total = $total,
            "Fetched chunk"
        );
    };
}

/// Error event whose message is `$context` and whose `error` field is the
/// error's full `{:#}` rendering, so `anyhow` chains stay on one line
///
/// ```no_run
/// let error = anyhow::anyhow!("connection refused").context("Opening session");
/// conveyor::log_error_with_context!(error, "Command execution failed");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(error = format!("{:#}", $error), "{}", $context);
    };
}
