//! Commands assembled from closures
//!
//! [`FnCommand`] lets a caller wire a run without declaring a type. Because the
//! pieces are supplied at run time, a missing `query` or `handle_row` closure
//! is reported by the runner as a misconfiguration instead of a compile error.

use super::command::{BatchCommand, DEFAULT_CHUNK_SIZE};
use crate::core::query_log::QueryLog;
use crate::core::source::{Chunk, DataSource};
use crate::core::transaction::TransactionScope;
use crate::domain::{BeltError, Record, Result};
use async_trait::async_trait;
use std::sync::Arc;

type QueryFn<R> = Box<dyn FnMut(&QueryLog) -> Result<Box<dyn DataSource<R>>> + Send>;
type HandleFn<R> = Box<dyn FnMut(&mut R) -> anyhow::Result<()> + Send>;
type HookFn = Box<dyn FnMut() -> Result<()> + Send>;
type ChunkFn<R> = Box<dyn FnMut(&mut Chunk<R>) -> Result<()> + Send>;

pub struct FnCommand<R> {
    row_name: String,
    row_name_plural: Option<String>,
    query: Option<QueryFn<R>>,
    handle_row: Option<HandleFn<R>>,
    before_first_row: Option<HookFn>,
    before_first_query: Option<HookFn>,
    after_last_row: Option<HookFn>,
    prepare_chunk: Option<ChunkFn<R>>,
    use_transaction: bool,
    collect_exceptions: bool,
    scope: Option<Arc<dyn TransactionScope>>,
    chunk_size: usize,
}

impl<R> FnCommand<R> {
    pub fn new(row_name: impl Into<String>) -> Self {
        Self {
            row_name: row_name.into(),
            row_name_plural: None,
            query: None,
            handle_row: None,
            before_first_row: None,
            before_first_query: None,
            after_last_row: None,
            prepare_chunk: None,
            use_transaction: false,
            collect_exceptions: false,
            scope: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_plural(mut self, plural: impl Into<String>) -> Self {
        self.row_name_plural = Some(plural.into());
        self
    }

    pub fn with_query<F>(mut self, query: F) -> Self
    where
        F: FnMut(&QueryLog) -> Result<Box<dyn DataSource<R>>> + Send + 'static,
    {
        self.query = Some(Box::new(query));
        self
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&mut R) -> anyhow::Result<()> + Send + 'static,
    {
        self.handle_row = Some(Box::new(handler));
        self
    }

    pub fn on_before_first_row<F>(mut self, hook: F) -> Self
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        self.before_first_row = Some(Box::new(hook));
        self
    }

    pub fn on_before_first_query<F>(mut self, hook: F) -> Self
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        self.before_first_query = Some(Box::new(hook));
        self
    }

    pub fn on_after_last_row<F>(mut self, hook: F) -> Self
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        self.after_last_row = Some(Box::new(hook));
        self
    }

    /// Called with each chunk before its records are handled
    pub fn on_prepare_chunk<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut Chunk<R>) -> Result<()> + Send + 'static,
    {
        self.prepare_chunk = Some(Box::new(hook));
        self
    }

    /// Wrap the run in `scope`
    pub fn with_transaction(mut self, scope: Arc<dyn TransactionScope>) -> Self {
        self.use_transaction = true;
        self.scope = Some(scope);
        self
    }

    /// Ask for a transaction without supplying a scope
    pub fn requires_transaction(mut self, enabled: bool) -> Self {
        self.use_transaction = enabled;
        self
    }

    pub fn collecting_exceptions(mut self, enabled: bool) -> Self {
        self.collect_exceptions = enabled;
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }
}

fn run_hook(hook: &mut Option<HookFn>) -> Result<()> {
    match hook {
        Some(hook) => hook(),
        None => Ok(()),
    }
}

#[async_trait]
impl<R> BatchCommand for FnCommand<R>
where
    R: Record + Send + Sync + 'static,
{
    type Record = R;

    async fn query(&mut self, log: &QueryLog) -> Result<Box<dyn DataSource<R>>> {
        match self.query.as_mut() {
            Some(query) => query(log),
            None => Err(missing("query")),
        }
    }

    async fn handle_row(&mut self, record: &mut R) -> anyhow::Result<()> {
        match self.handle_row.as_mut() {
            Some(handler) => handler(record),
            None => Err(missing("handle_row").into()),
        }
    }

    async fn before_first_row(&mut self) -> Result<()> {
        run_hook(&mut self.before_first_row)
    }

    async fn before_first_query(&mut self) -> Result<()> {
        run_hook(&mut self.before_first_query)
    }

    async fn after_last_row(&mut self) -> Result<()> {
        run_hook(&mut self.after_last_row)
    }

    async fn prepare_chunk(&mut self, chunk: &mut Chunk<R>) -> Result<()> {
        match self.prepare_chunk.as_mut() {
            Some(hook) => hook(chunk),
            None => Ok(()),
        }
    }

    fn row_name(&self) -> String {
        self.row_name.clone()
    }

    fn row_name_plural(&self) -> String {
        self.row_name_plural
            .clone()
            .unwrap_or_else(|| format!("{}s", self.row_name))
    }

    fn use_transaction(&self) -> bool {
        self.use_transaction
    }

    fn collect_exceptions(&self) -> bool {
        self.collect_exceptions
    }

    fn transaction_scope(&self) -> Option<Arc<dyn TransactionScope>> {
        self.scope.clone()
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn check_wiring(&self) -> Result<()> {
        if self.handle_row.is_none() {
            return Err(missing("handle_row"));
        }
        if self.query.is_none() {
            return Err(missing("query"));
        }
        Ok(())
    }
}

fn missing(hook: &str) -> BeltError {
    BeltError::Misconfigured(format!("You must implement FnCommand::{hook}()"))
}
