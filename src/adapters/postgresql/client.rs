//! PostgreSQL client implementation

use super::session::PgSession;
use crate::config::schema::{PostgreSQLConfig, SslMode};
use crate::config::redact_connection_string;
use crate::domain::{BeltError, Result};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use postgres_native_tls::MakeTlsConnector;
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::config::SslMode as WireSslMode;
use tokio_postgres::NoTls;

/// PostgreSQL client backed by a connection pool
pub struct PostgreSQLClient {
    pool: Pool,
    config: PostgreSQLConfig,
}

impl PostgreSQLClient {
    /// Create a new PostgreSQL client
    ///
    /// No connection is made until a session is requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string cannot be parsed or the pool
    /// cannot be built.
    pub fn new(config: PostgreSQLConfig) -> Result<Self> {
        let mut pg_config: tokio_postgres::Config = config
            .connection_string
            .expose_secret()
            .as_ref()
            .parse()
            .map_err(|e| {
                BeltError::Configuration(format!("Invalid PostgreSQL connection string: {}", e))
            })?;

        pg_config.ssl_mode(match config.ssl_mode {
            SslMode::Disable => WireSslMode::Disable,
            mode if mode.requires_tls() => WireSslMode::Require,
            _ => WireSslMode::Prefer,
        });

        let manager = build_manager(pg_config, &config)?;
        let timeout = Some(Duration::from_secs(config.connection_timeout_seconds));

        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .wait_timeout(timeout)
            .create_timeout(timeout)
            .recycle_timeout(timeout)
            .build()
            .map_err(|e| {
                BeltError::Database(format!("Failed to create connection pool: {}", e))
            })?;

        Ok(Self { pool, config })
    }

    /// Check out a connection for one run
    ///
    /// The session's statement timeout is set from the configuration.
    pub async fn session(&self) -> Result<PgSession> {
        let client = self.pool.get().await.map_err(|e| {
            BeltError::Database(format!("Failed to get connection from pool: {}", e))
        })?;

        let timeout = format!(
            "SET statement_timeout = {}",
            self.config.statement_timeout_seconds * 1000
        );
        client
            .batch_execute(&timeout)
            .await
            .map_err(|e| BeltError::Database(format!("Failed to set statement timeout: {}", e)))?;

        tracing::debug!(
            database = %self.connection_string_safe(),
            statement_timeout_seconds = self.config.statement_timeout_seconds,
            "PostgreSQL session opened"
        );

        Ok(PgSession::new(client))
    }

    /// Check that a connection can be made and a trivial query answered
    pub async fn test_connection(&self) -> Result<()> {
        let session = self.session().await?;
        session.batch_execute("SELECT 1").await?;
        tracing::info!(database = %self.connection_string_safe(), "PostgreSQL connection test successful");
        Ok(())
    }

    /// Get the connection string (without credentials)
    pub fn connection_string_safe(&self) -> String {
        redact_connection_string(self.config.connection_string.expose_secret().as_ref())
    }

    /// Get the pool statistics
    pub fn pool_status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }
}

fn build_manager(pg_config: tokio_postgres::Config, config: &PostgreSQLConfig) -> Result<Manager> {
    let manager_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };

    if !config.requires_tls() {
        return Ok(Manager::from_config(pg_config, NoTls, manager_config));
    }

    let mut builder = native_tls::TlsConnector::builder();
    match config.ssl_mode {
        // Encrypted but unauthenticated, as libpq does
        SslMode::Require => {
            builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        SslMode::VerifyCa => {
            builder.danger_accept_invalid_hostnames(true);
        }
        _ => {}
    }

    let connector = builder
        .build()
        .map_err(|e| BeltError::Configuration(format!("Failed to build TLS connector: {}", e)))?;

    Ok(Manager::from_config(
        pg_config,
        MakeTlsConnector::new(connector),
        manager_config,
    ))
}
