//! The capability interface a hosting command implements

use crate::core::query_log::QueryLog;
use crate::core::source::{Chunk, DataSource};
use crate::core::transaction::TransactionScope;
use crate::domain::{Record, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Default number of records fetched per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// A command driven record by record by [`BatchRunner`](super::BatchRunner)
///
/// `query` and `handle_row` are mandatory. Every other hook is a no-op by
/// default and policy toggles default to off.
#[async_trait]
pub trait BatchCommand: Send {
    type Record: Record + Send + Sync;

    /// Build a fresh data source for this run. Statements the source or the
    /// handlers execute should be recorded into `log`.
    async fn query(&mut self, log: &QueryLog) -> Result<Box<dyn DataSource<Self::Record>>>;

    /// Process one record
    async fn handle_row(&mut self, record: &mut Self::Record) -> anyhow::Result<()>;

    /// Runs before the `--dump-sql` check, so the query may depend on it
    async fn before_first_row(&mut self) -> Result<()> {
        Ok(())
    }

    /// Runs inside the transaction scope, right before the first fetch
    async fn before_first_query(&mut self) -> Result<()> {
        Ok(())
    }

    /// Runs once per chunk before any of its records are handled
    async fn prepare_chunk(&mut self, _chunk: &mut Chunk<Self::Record>) -> Result<()> {
        Ok(())
    }

    async fn after_last_row(&mut self) -> Result<()> {
        Ok(())
    }

    fn row_name(&self) -> String {
        "row".to_string()
    }

    fn row_name_plural(&self) -> String {
        format!("{}s", self.row_name())
    }

    fn use_transaction(&self) -> bool {
        false
    }

    fn collect_exceptions(&self) -> bool {
        false
    }

    /// Scope used when `use_transaction` is on
    fn transaction_scope(&self) -> Option<Arc<dyn TransactionScope>> {
        None
    }

    fn chunk_size(&self) -> usize {
        DEFAULT_CHUNK_SIZE
    }

    /// Report wiring defects that can only be detected at run time
    fn check_wiring(&self) -> Result<()> {
        Ok(())
    }
}
