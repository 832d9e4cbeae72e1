//! A pooled connection shared by everything in one run

use crate::core::query_log::QueryLog;
use crate::core::source::QueryText;
use crate::domain::{BeltError, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

/// One checked-out connection plus the query log its statements go to
///
/// Statements use `?` placeholders; they are rewritten to `$n` before being
/// sent. Clones share the connection.
#[derive(Clone)]
pub struct PgSession {
    client: Arc<deadpool_postgres::Object>,
    log: QueryLog,
}

impl PgSession {
    pub fn new(client: deadpool_postgres::Object) -> Self {
        Self {
            client: Arc::new(client),
            log: QueryLog::new(),
        }
    }

    /// Same connection, recording into `log`
    pub fn with_log(&self, log: &QueryLog) -> Self {
        Self {
            client: Arc::clone(&self.client),
            log: log.clone(),
        }
    }

    pub fn log(&self) -> &QueryLog {
        &self.log
    }

    /// Run a statement that returns rows
    pub async fn query(&self, statement: &QueryText) -> Result<Vec<Row>> {
        let sql = statement.numbered_placeholders(1);
        let params = params(statement);

        let started = Instant::now();
        let rows = self
            .client
            .query(sql.as_str(), &params)
            .await
            .map_err(|e| database_error("Query failed", &e))?;

        self.log
            .record(&statement.sql, statement.bindings.clone(), Some(started.elapsed()));
        tracing::trace!(sql = %statement.sql, rows = rows.len(), "Query executed");
        Ok(rows)
    }

    /// Run a statement and return the number of affected rows
    pub async fn execute(&self, statement: &QueryText) -> Result<u64> {
        let sql = statement.numbered_placeholders(1);
        let params = params(statement);

        let started = Instant::now();
        let affected = self
            .client
            .execute(sql.as_str(), &params)
            .await
            .map_err(|e| database_error("Statement execution failed", &e))?;

        self.log
            .record(&statement.sql, statement.bindings.clone(), Some(started.elapsed()));
        tracing::trace!(sql = %statement.sql, affected, "Statement executed");
        Ok(affected)
    }

    /// Run parameterless SQL, such as transaction control
    pub async fn batch_execute(&self, sql: &str) -> Result<()> {
        let started = Instant::now();
        self.client
            .batch_execute(sql)
            .await
            .map_err(|e| database_error("Statement execution failed", &e))?;

        self.log.record(sql, Vec::new(), Some(started.elapsed()));
        Ok(())
    }

    /// Run parameterless SQL without recording it in the query log
    pub async fn control(&self, sql: &str) -> Result<()> {
        self.client
            .batch_execute(sql)
            .await
            .map_err(|e| database_error("Statement execution failed", &e))?;
        tracing::trace!(sql, "Control statement executed");
        Ok(())
    }
}

fn params(statement: &QueryText) -> Vec<&(dyn ToSql + Sync)> {
    statement
        .bindings
        .iter()
        .map(|value| value as &(dyn ToSql + Sync))
        .collect()
}

/// Prefer the server's message over the driver's generic "db error"
fn database_error(context: &str, err: &tokio_postgres::Error) -> BeltError {
    match err.as_db_error() {
        Some(db) => BeltError::Database(format!("{}: {}", context, db.message())),
        None => BeltError::Database(format!("{}: {}", context, err)),
    }
}
