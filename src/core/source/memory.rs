//! In-memory data source

use super::{Chunk, DataSource, QueryText};
use crate::domain::{BeltError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;

/// Yields a fixed list of records in order
pub struct VecSource<R> {
    records: VecDeque<R>,
    total: u64,
    chunks_fetched: usize,
    query_text: Option<QueryText>,
}

impl<R> VecSource<R> {
    pub fn new(records: Vec<R>) -> Self {
        Self {
            total: records.len() as u64,
            records: records.into(),
            chunks_fetched: 0,
            query_text: None,
        }
    }

    /// Attach query text to report for `--dump-sql`
    pub fn with_query_text(mut self, query_text: QueryText) -> Self {
        self.query_text = Some(query_text);
        self
    }

    /// Records not yet handed out
    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

impl<R> FromIterator<R> for VecSource<R> {
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[async_trait]
impl<R: Send> DataSource<R> for VecSource<R> {
    async fn count(&mut self) -> Result<u64> {
        Ok(self.total)
    }

    async fn next_chunk(&mut self, chunk_size: usize) -> Result<Option<Chunk<R>>> {
        if chunk_size == 0 {
            return Err(BeltError::Misconfigured(
                "Chunk size must be greater than zero".to_string(),
            ));
        }

        if self.records.is_empty() {
            return Ok(None);
        }

        let take = chunk_size.min(self.records.len());
        let records: Vec<R> = self.records.drain(..take).collect();
        let chunk = Chunk::new(self.chunks_fetched, records);
        self.chunks_fetched += 1;

        Ok(Some(chunk))
    }

    fn query_text(&self) -> Option<QueryText> {
        self.query_text.clone()
    }
}
