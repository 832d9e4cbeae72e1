//! Query-backed data source
//!
//! The caller's query is never modified; it is wrapped. Counting runs
//! `select count(*) from (<query>)`, and each chunk selects a page from the
//! same wrapped query.

use super::row::tracked_row;
use super::session::PgSession;
use crate::core::source::{Chunk, DataSource, QueryText};
use crate::domain::{BeltError, Record, Result, SqlValue, TrackedRow};
use async_trait::async_trait;

/// How successive chunks are selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStrategy {
    /// LIMIT/OFFSET paging. The query must have a stable order, and handlers
    /// must not change columns it filters on.
    Offset,
    /// Keyset paging on a unique, sortable column. Safe when handlers change
    /// the rows the query matches.
    ById { column: String },
}

/// Builds the count and page statements for one query
#[derive(Debug, Clone)]
pub struct ChunkPlanner {
    query: QueryText,
    strategy: ChunkStrategy,
    offset: u64,
    last_key: Option<SqlValue>,
}

impl ChunkPlanner {
    pub fn new(query: QueryText, strategy: ChunkStrategy) -> Self {
        let sql = query.sql.trim().trim_end_matches(';').trim_end().to_string();
        Self {
            query: QueryText::new(sql, query.bindings),
            strategy,
            offset: 0,
            last_key: None,
        }
    }

    pub fn query(&self) -> &QueryText {
        &self.query
    }

    pub fn count_statement(&self) -> QueryText {
        QueryText::new(
            format!("select count(*) from ({}) as conveyor_count", self.query.sql),
            self.query.bindings.clone(),
        )
    }

    /// Statement selecting the next page of `size` rows
    pub fn chunk_statement(&self, size: usize) -> QueryText {
        match &self.strategy {
            ChunkStrategy::Offset => QueryText::new(
                format!("{} limit {} offset {}", self.query.sql, size, self.offset),
                self.query.bindings.clone(),
            ),
            ChunkStrategy::ById { column } => {
                let column = quote_ident(column);
                let mut bindings = self.query.bindings.clone();
                let filter = match &self.last_key {
                    Some(last) => {
                        bindings.push(last.clone());
                        format!(" where {column} > ?")
                    }
                    None => String::new(),
                };
                QueryText::new(
                    format!(
                        "select * from ({}) as conveyor_chunk{} order by {} limit {}",
                        self.query.sql, filter, column, size
                    ),
                    bindings,
                )
            }
        }
    }

    /// Move past a fetched page
    pub fn advance(&mut self, rows: &[TrackedRow]) -> Result<()> {
        self.offset += rows.len() as u64;

        if let ChunkStrategy::ById { column } = &self.strategy {
            if let Some(last) = rows.last() {
                let key = last.get(column).ok_or_else(|| {
                    BeltError::Misconfigured(format!(
                        "Chunking by '{column}' requires the query to select that column"
                    ))
                })?;
                if key.is_null() {
                    return Err(BeltError::Misconfigured(format!(
                        "Chunking by '{column}' requires non-null values, got null for {}",
                        last.describe()
                    )));
                }
                self.last_key = Some(SqlValue::from_json(key));
            }
        }

        Ok(())
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Iterates a PostgreSQL query in chunks of change-tracked rows
pub struct PgQuerySource {
    session: PgSession,
    planner: ChunkPlanner,
    key: Option<String>,
    next_index: usize,
    exhausted: bool,
}

impl PgQuerySource {
    pub fn new(session: PgSession, query: QueryText) -> Self {
        Self {
            session,
            planner: ChunkPlanner::new(query, ChunkStrategy::Offset),
            key: None,
            next_index: 0,
            exhausted: false,
        }
    }

    /// Page by `column` instead of by offset. The column also becomes the
    /// row key unless one is set.
    pub fn chunk_by_id(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        if self.key.is_none() {
            self.key = Some(column.clone());
        }
        self.planner = ChunkPlanner::new(
            self.planner.query().clone(),
            ChunkStrategy::ById { column },
        );
        self
    }

    /// Field used to identify rows in failure reports
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

#[async_trait]
impl DataSource<TrackedRow> for PgQuerySource {
    async fn count(&mut self) -> Result<u64> {
        let rows = self.session.query(&self.planner.count_statement()).await?;
        let count: i64 = match rows.first() {
            Some(row) => row.try_get(0)?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn next_chunk(&mut self, chunk_size: usize) -> Result<Option<Chunk<TrackedRow>>> {
        if chunk_size == 0 {
            return Err(BeltError::Misconfigured(
                "Chunk size must be greater than 0".to_string(),
            ));
        }
        if self.exhausted {
            return Ok(None);
        }

        let statement = self.planner.chunk_statement(chunk_size);
        let rows = self.session.query(&statement).await?;
        let records = rows
            .iter()
            .map(|row| tracked_row(row, self.key.as_deref()))
            .collect::<Result<Vec<_>>>()?;

        if records.len() < chunk_size {
            self.exhausted = true;
        }
        if records.is_empty() {
            return Ok(None);
        }

        self.planner.advance(&records)?;
        let chunk = Chunk::new(self.next_index, records);
        self.next_index += 1;
        Ok(Some(chunk))
    }

    fn query_text(&self) -> Option<QueryText> {
        Some(self.planner.query().clone())
    }
}
