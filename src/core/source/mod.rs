//! Data sources
//!
//! A [`DataSource`] produces a total count and a lazily fetched, chunked
//! sequence of records. Sources are single-use: once `next_chunk` returns
//! `None` the source is exhausted, and a new run needs a new source. A source
//! owns its own cursor and may be dropped mid-iteration when a run aborts.

pub mod json;
pub mod memory;

pub use json::JsonFileSource;
pub use memory::VecSource;

use crate::domain::{Result, SqlValue};
use async_trait::async_trait;

/// Records source for one run
#[async_trait]
pub trait DataSource<R>: Send {
    /// Total number of records the source will yield
    async fn count(&mut self) -> Result<u64>;

    /// Fetch the next chunk of at most `chunk_size` records, `None` when exhausted
    async fn next_chunk(&mut self, chunk_size: usize) -> Result<Option<Chunk<R>>>;

    /// Equivalent query text and bindings, for sources backed by a query
    fn query_text(&self) -> Option<QueryText> {
        None
    }
}

/// An ordered batch of records fetched together
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk<R> {
    index: usize,
    records: Vec<R>,
}

impl<R> Chunk<R> {
    pub fn new(index: usize, records: Vec<R>) -> Self {
        Self { index, records }
    }

    /// Zero-based position of this chunk in the run
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [R] {
        &mut self.records
    }

    pub fn into_records(self) -> Vec<R> {
        self.records
    }
}

/// A SQL template with `?` placeholders and its ordered bindings
#[derive(Debug, Clone, PartialEq)]
pub struct QueryText {
    pub sql: String,
    pub bindings: Vec<SqlValue>,
}

impl QueryText {
    pub fn new(sql: impl Into<String>, bindings: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            bindings,
        }
    }

    /// Substitute each `?` outside of quoted sections with the next binding
    /// rendered as a literal. Placeholders left without a binding stay as `?`.
    pub fn render(&self) -> String {
        let mut bindings = self.bindings.iter();
        map_placeholders(&self.sql, |_| {
            bindings
                .next()
                .map(SqlValue::to_literal)
                .unwrap_or_else(|| "?".to_string())
        })
    }

    /// Rewrite `?` placeholders to PostgreSQL's numbered `$n` form, starting at
    /// `first`
    pub fn numbered_placeholders(&self, first: usize) -> String {
        map_placeholders(&self.sql, |position| format!("${}", first + position))
    }

    /// Number of `?` placeholders outside of quoted sections
    pub fn placeholder_count(&self) -> usize {
        let mut count = 0;
        map_placeholders(&self.sql, |_| {
            count += 1;
            String::new()
        });
        count
    }
}

/// Walk `sql`, replacing each `?` that is not inside a single-quoted string,
/// double-quoted identifier or line comment with `replace(position)`
fn map_placeholders(sql: &str, mut replace: impl FnMut(usize) -> String) -> String {
    let mut output = String::with_capacity(sql.len());
    let mut quote: Option<char> = None;
    let mut in_comment = false;
    let mut position = 0;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        if in_comment {
            output.push(c);
            if c == '\n' {
                in_comment = false;
            }
            continue;
        }

        match (quote, c) {
            (Some(q), c) if c == q => {
                output.push(c);
                // Doubled quote is an escape, stay inside the literal
                if chars.peek() == Some(&q) {
                    output.push(q);
                    chars.next();
                } else {
                    quote = None;
                }
            }
            (Some(_), c) => output.push(c),
            (None, '\'') | (None, '"') => {
                quote = Some(c);
                output.push(c);
            }
            (None, '-') if chars.peek() == Some(&'-') => {
                in_comment = true;
                output.push(c);
            }
            (None, '?') => {
                output.push_str(&replace(position));
                position += 1;
            }
            (None, c) => output.push(c),
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_in_order() {
        let query = QueryText::new(
            "select * from users where name = ? and age > ? order by name asc",
            vec![SqlValue::from("Chris"), SqlValue::Int(30)],
        );
        assert_eq!(
            query.render(),
            "select * from users where name = 'Chris' and age > 30 order by name asc"
        );
    }

    #[test]
    fn test_render_skips_quoted_question_marks() {
        let query = QueryText::new(
            "select '?' as q, \"what?\" from t where a = ? -- why?\nand b = ?",
            vec![SqlValue::Int(1), SqlValue::Null],
        );
        assert_eq!(
            query.render(),
            "select '?' as q, \"what?\" from t where a = 1 -- why?\nand b = NULL"
        );
    }

    #[test]
    fn test_render_handles_escaped_quotes() {
        let query = QueryText::new(
            "select * from t where a = 'it''s ?' and b = ?",
            vec![SqlValue::from("x")],
        );
        assert_eq!(query.render(), "select * from t where a = 'it''s ?' and b = 'x'");
    }

    #[test]
    fn test_render_leaves_unbound_placeholders() {
        let query = QueryText::new("select ?, ?", vec![SqlValue::Int(1)]);
        assert_eq!(query.render(), "select 1, ?");
    }

    #[test]
    fn test_numbered_placeholders() {
        let query = QueryText::new("select * from t where a = ? and b = '?' and c = ?", vec![]);
        assert_eq!(
            query.numbered_placeholders(1),
            "select * from t where a = $1 and b = '?' and c = $2"
        );
        assert_eq!(query.placeholder_count(), 2);
    }

    #[test]
    fn test_chunk_accessors() {
        let mut chunk = Chunk::new(3, vec![1, 2]);
        assert_eq!(chunk.index(), 3);
        assert_eq!(chunk.len(), 2);
        chunk.records_mut()[0] = 9;
        assert_eq!(chunk.into_records(), vec![9, 2]);
    }
}
