//! `query` command
//!
//! Iterates the rows of a PostgreSQL `SELECT` and, optionally, runs a
//! statement for each one. The per-row statement names row columns with
//! `:column` placeholders:
//!
//! ```text
//! conveyor query \
//!     --select "select id, email from users where created_at > ?" \
//!     --bind 2024-01-01 \
//!     --execute "update users set email = lower(:email) where id = :id returning email" \
//!     --chunk-by-id id --transaction --diff
//! ```
//!
//! When the statement has a `RETURNING` clause, the returned columns are
//! written back into the row so `--diff` can show what changed.

use crate::adapters::postgresql::row::tracked_row;
use crate::adapters::postgresql::{PgQuerySource, PgSession, PgTransaction, PostgreSQLClient};
use crate::cli::BeltFlags;
use crate::config::{load_config_or_default, BeltConfig};
use crate::core::query_log::QueryLog;
use crate::core::runner::{BatchCommand, BatchRunner};
use crate::core::source::{DataSource, QueryText};
use crate::core::transaction::TransactionScope;
use crate::domain::{Record, Result, SqlValue, TrackedRow};
use async_trait::async_trait;
use clap::Args;
use std::sync::Arc;

/// Arguments for the query command
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// SELECT statement producing the rows, with `?` placeholders
    #[arg(long)]
    pub select: String,

    /// Value for the next `?` placeholder of --select (repeatable)
    #[arg(long = "bind", value_name = "VALUE", allow_hyphen_values = true)]
    pub bindings: Vec<String>,

    /// Statement run for each row; `:column` is replaced by the row's value
    #[arg(long = "execute", value_name = "SQL")]
    pub statement: Option<String>,

    /// Page through the rows by this ascending unique column instead of OFFSET
    #[arg(long, value_name = "COLUMN")]
    pub chunk_by_id: Option<String>,

    /// Column identifying a row in failure reports
    #[arg(long, value_name = "COLUMN")]
    pub key: Option<String>,

    /// Wrap the run in a database transaction
    #[arg(long)]
    pub transaction: bool,

    /// Keep going after a row fails and report all failures at the end
    #[arg(long)]
    pub collect_exceptions: bool,

    /// Rows fetched per chunk (defaults to belt.chunk_size)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Singular noun used in messages
    #[arg(long, default_value = "row")]
    pub row_name: String,

    #[command(flatten)]
    pub flags: BeltFlags,
}

impl QueryArgs {
    /// Execute the query command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, select = %self.select, "Starting query run");

        let config = match load_config_or_default(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Configuration error: {e}");
                return Ok(2);
            }
        };

        let Some(pg_config) = config.postgresql.clone() else {
            eprintln!(
                "The query command needs a [postgresql] section or CONVEYOR_POSTGRESQL_CONNECTION_STRING"
            );
            return Ok(2);
        };

        let client = PostgreSQLClient::new(pg_config)?;
        let session = match client.session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(
                    connection = %client.connection_string_safe(),
                    error = %e,
                    "Failed to connect to PostgreSQL"
                );
                eprintln!("Failed to connect to PostgreSQL: {e}");
                return Ok(1);
            }
        };

        let command = QueryCommand::new(self, &config.belt, session);
        let mut runner = BatchRunner::new(command, self.flags.run_config());
        Ok(runner.run().await)
    }
}

/// Runs `--execute` once for every row of `--select`
pub struct QueryCommand {
    session: PgSession,
    select: QueryText,
    statement: Option<RowStatement>,
    chunk_by_id: Option<String>,
    key: Option<String>,
    row_name: String,
    use_transaction: bool,
    collect_exceptions: bool,
    chunk_size: usize,
}

impl QueryCommand {
    /// Command-line flags win over the `[belt]` defaults
    pub fn new(args: &QueryArgs, belt: &BeltConfig, session: PgSession) -> Self {
        let bindings = args.bindings.iter().map(|b| SqlValue::parse_cli(b)).collect();

        Self {
            session,
            select: QueryText::new(args.select.clone(), bindings),
            statement: args.statement.as_deref().map(RowStatement::parse),
            chunk_by_id: args.chunk_by_id.clone(),
            key: args.key.clone(),
            row_name: args.row_name.clone(),
            use_transaction: args.transaction || belt.use_transaction,
            collect_exceptions: args.collect_exceptions || belt.collect_exceptions,
            chunk_size: args.chunk_size.unwrap_or(belt.chunk_size),
        }
    }
}

#[async_trait]
impl BatchCommand for QueryCommand {
    type Record = TrackedRow;

    async fn query(&mut self, log: &QueryLog) -> Result<Box<dyn DataSource<TrackedRow>>> {
        self.session = self.session.with_log(log);

        let mut source = PgQuerySource::new(self.session.clone(), self.select.clone());
        if let Some(ref column) = self.chunk_by_id {
            source = source.chunk_by_id(column.clone());
        }
        if let Some(ref key) = self.key {
            source = source.with_key(key.clone());
        }

        Ok(Box::new(source))
    }

    async fn handle_row(&mut self, record: &mut TrackedRow) -> anyhow::Result<()> {
        let Some(ref statement) = self.statement else {
            return Ok(());
        };

        let bound = statement.bind(record)?;
        if statement.returns_rows() {
            let rows = self.session.query(&bound).await?;
            if let Some(row) = rows.first() {
                let returned = tracked_row(row, None)?;
                for (field, value) in returned.attributes() {
                    record.set(field.clone(), value.clone());
                }
            }
        } else {
            let affected = self.session.execute(&bound).await?;
            tracing::debug!(record = %record.describe(), affected, "Row statement executed");
        }

        record.sync_changes();
        Ok(())
    }

    fn row_name(&self) -> String {
        self.row_name.clone()
    }

    fn use_transaction(&self) -> bool {
        self.use_transaction
    }

    fn collect_exceptions(&self) -> bool {
        self.collect_exceptions
    }

    fn transaction_scope(&self) -> Option<Arc<dyn TransactionScope>> {
        Some(Arc::new(PgTransaction::new(self.session.clone())))
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

/// A statement template whose `:column` placeholders are filled from a row
#[derive(Debug, Clone, PartialEq)]
pub struct RowStatement {
    sql: String,
    columns: Vec<String>,
    returns_rows: bool,
}

impl RowStatement {
    /// Replace each `:column` outside quotes with `?`. `::type` casts are left
    /// alone.
    pub fn parse(template: &str) -> Self {
        let mut sql = String::with_capacity(template.len());
        let mut columns = Vec::new();
        let mut quote: Option<char> = None;
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            if let Some(q) = quote {
                sql.push(c);
                if c == q {
                    quote = None;
                }
                continue;
            }

            match c {
                '\'' | '"' => {
                    quote = Some(c);
                    sql.push(c);
                }
                ':' if chars.peek() == Some(&':') => {
                    chars.next();
                    sql.push_str("::");
                }
                ':' if chars.peek().is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') => {
                    let mut column = String::new();
                    while let Some(&n) = chars.peek() {
                        if !(n.is_ascii_alphanumeric() || n == '_') {
                            break;
                        }
                        column.push(n);
                        chars.next();
                    }
                    columns.push(column);
                    sql.push('?');
                }
                _ => sql.push(c),
            }
        }

        let returns_rows = sql
            .split_whitespace()
            .any(|word| word.eq_ignore_ascii_case("returning"));

        Self {
            sql,
            columns,
            returns_rows,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Column names in placeholder order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn returns_rows(&self) -> bool {
        self.returns_rows
    }

    /// Bind the row's values; a column the row doesn't have fails the row
    pub fn bind(&self, row: &TrackedRow) -> anyhow::Result<QueryText> {
        let bindings = self
            .columns
            .iter()
            .map(|column| {
                row.get(column)
                    .map(SqlValue::from_json)
                    .ok_or_else(|| anyhow::anyhow!("Row has no column named '{column}'"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(QueryText::new(self.sql.clone(), bindings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn row(value: serde_json::Value) -> TrackedRow {
        TrackedRow::from_json(value).unwrap()
    }

    #[test]
    fn test_parse_named_placeholders() {
        let statement =
            RowStatement::parse("update users set email = lower(:email) where id = :id");
        assert_eq!(
            statement.sql(),
            "update users set email = lower(?) where id = ?"
        );
        assert_eq!(statement.columns(), ["email", "id"]);
        assert!(!statement.returns_rows());
    }

    #[test_case("select :id::text", "select ?::text", &["id"] ; "cast after placeholder")]
    #[test_case("select ':id', :id", "select ':id', ?", &["id"] ; "quoted text untouched")]
    #[test_case("select \"a:b\" from t", "select \"a:b\" from t", &[] ; "quoted identifier untouched")]
    #[test_case("select now()::date", "select now()::date", &[] ; "plain cast")]
    fn test_parse_edge_cases(template: &str, sql: &str, columns: &[&str]) {
        let statement = RowStatement::parse(template);
        assert_eq!(statement.sql(), sql);
        assert_eq!(statement.columns(), columns);
    }

    #[test]
    fn test_returning_detected() {
        let statement = RowStatement::parse(
            "update users set name = upper(name) where id = :id RETURNING name",
        );
        assert!(statement.returns_rows());
    }

    #[test]
    fn test_bind_uses_row_values() {
        let statement = RowStatement::parse("delete from sessions where user_id = :id and ip = :ip");
        let bound = statement
            .bind(&row(json!({"id": 7, "ip": "10.0.0.1"})))
            .unwrap();

        assert_eq!(
            bound.bindings,
            vec![SqlValue::Int(7), SqlValue::Text("10.0.0.1".to_string())]
        );
        assert_eq!(
            bound.render(),
            "delete from sessions where user_id = 7 and ip = '10.0.0.1'"
        );
    }

    #[test]
    fn test_bind_missing_column_fails() {
        let statement = RowStatement::parse("update users set x = 1 where id = :user_id");
        let err = statement.bind(&row(json!({"id": 1}))).unwrap_err();
        assert_eq!(err.to_string(), "Row has no column named 'user_id'");
    }
}
