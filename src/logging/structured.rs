//! Subscriber setup
//!
//! Two sinks share one filter: human-readable lines on stderr, and optional
//! JSON lines in rolling files for unattended runs.

use crate::config::{LogRotation, LoggingConfig};
use crate::domain::{BeltError, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps the file writer's worker alive; dropping it flushes pending lines
pub struct LoggingGuard {
    _worker: Option<WorkerGuard>,
}

impl std::fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingGuard")
            .field("file_logging", &self._worker.is_some())
            .finish()
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` wins over `log_level` when set. Without it, only Conveyor's own
/// events at `log_level` and above are shown.
///
/// # Errors
///
/// A `Configuration` error for an unknown level, a log directory that cannot
/// be created, or a subscriber that is already installed.
pub fn init_logging(log_level: &str, config: &LoggingConfig) -> Result<LoggingGuard> {
    let level = parse_log_level(log_level)?;
    let directive = format!("conveyor={}", level.as_str().to_ascii_lowercase());
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive))
    };

    let mut layers: Vec<BoxedLayer> = vec![tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter())
        .boxed()];

    let worker = match file_layer(config)? {
        Some((layer, worker)) => {
            layers.push(layer.with_filter(filter()).boxed());
            Some(worker)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| BeltError::Configuration(format!("Failed to initialize logging: {e}")))?;

    tracing::debug!(
        %level,
        file_logging = config.local_enabled,
        path = %config.local_path,
        "Logging initialized"
    );

    Ok(LoggingGuard { _worker: worker })
}

/// JSON layer writing under `config.local_path`, when file logging is on
fn file_layer(config: &LoggingConfig) -> Result<Option<(BoxedLayer, WorkerGuard)>> {
    if !config.local_enabled {
        return Ok(None);
    }

    std::fs::create_dir_all(&config.local_path).map_err(|e| {
        BeltError::Configuration(format!(
            "Failed to create log directory {}: {e}",
            config.local_path
        ))
    })?;

    let appender = RollingFileAppender::new(
        rotation(config.local_rotation),
        &config.local_path,
        &config.file_prefix,
    );
    let (writer, worker) = tracing_appender::non_blocking(appender);

    let layer = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(false)
        .with_writer(writer)
        .boxed();

    Ok(Some((layer, worker)))
}

fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Never => Rotation::NEVER,
    }
}

/// Parse a level name, ignoring case
pub fn parse_log_level(name: &str) -> Result<Level> {
    name.trim().parse::<Level>().map_err(|_| {
        BeltError::Configuration(format!(
            "Invalid log level '{name}'. Use trace, debug, info, warn or error"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("trace", Level::TRACE)]
    #[test_case("DEBUG", Level::DEBUG)]
    #[test_case("Info", Level::INFO)]
    #[test_case(" warn ", Level::WARN)]
    #[test_case("error", Level::ERROR)]
    fn test_parse_log_level(name: &str, expected: Level) {
        assert_eq!(parse_log_level(name).unwrap(), expected);
    }

    #[test_case("verbose")]
    #[test_case("")]
    fn test_parse_log_level_rejects(name: &str) {
        let err = parse_log_level(name).unwrap_err();
        assert!(err.to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_rotation_mapping() {
        assert_eq!(rotation(LogRotation::Hourly), Rotation::HOURLY);
        assert_eq!(rotation(LogRotation::Never), Rotation::NEVER);
        assert_eq!(rotation(LogRotation::default()), Rotation::DAILY);
    }

    #[test]
    fn test_guard_debug_reports_file_logging() {
        let guard = LoggingGuard { _worker: None };
        assert_eq!(format!("{guard:?}"), "LoggingGuard { file_logging: false }");
    }

    #[test]
    fn test_file_layer_disabled() {
        assert!(file_layer(&LoggingConfig::default()).unwrap().is_none());
    }
}
