//! Query log handle
//!
//! A [`QueryLog`] is created by the runner for each run and handed to the
//! command's `query` hook. Sources and handlers record the statements they
//! execute into it; the runner drains it after every record when `--log-sql`
//! is active. A drain returns everything recorded since the previous drain,
//! including statements issued by lifecycle hooks and by the source itself.
//!
//! Clones share the same buffer. Recording into a disabled log is a no-op.

use crate::core::source::QueryText;
use crate::domain::SqlValue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A statement that was executed
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedQuery {
    pub query: QueryText,
    pub duration: Option<Duration>,
}

#[derive(Debug, Default)]
struct Inner {
    enabled: AtomicBool,
    entries: Mutex<Vec<LoggedQuery>>,
}

/// Shared buffer of executed statements
#[derive(Debug, Clone, Default)]
pub struct QueryLog {
    inner: Arc<Inner>,
}

impl QueryLog {
    /// Create a disabled log
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log that records immediately
    pub fn enabled() -> Self {
        let log = Self::new();
        log.set_enabled(true);
        log
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Record an executed statement
    pub fn record(&self, sql: impl Into<String>, bindings: Vec<SqlValue>, duration: Option<Duration>) {
        if !self.is_enabled() {
            return;
        }

        let entry = LoggedQuery {
            query: QueryText::new(sql, bindings),
            duration,
        };

        match self.inner.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }

    /// Take every entry recorded since the last drain
    pub fn drain(&self) -> Vec<LoggedQuery> {
        match self.inner.entries.lock() {
            Ok(mut entries) => std::mem::take(&mut *entries),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    /// Number of entries waiting to be drained
    pub fn len(&self) -> usize {
        match self.inner.entries.lock() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_log_records_nothing() {
        let log = QueryLog::new();
        log.record("select 1", vec![], None);
        assert!(log.is_empty());
    }

    #[test]
    fn test_drain_returns_entries_since_last_drain() {
        let log = QueryLog::enabled();
        log.record("select 1", vec![], None);
        log.record("select ?", vec![SqlValue::Int(2)], None);

        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].query.render(), "select 2");
        assert!(log.drain().is_empty());

        log.record("select 3", vec![], None);
        assert_eq!(log.drain().len(), 1);
    }

    #[test]
    fn test_clones_share_buffer() {
        let log = QueryLog::new();
        let handle = log.clone();
        log.set_enabled(true);
        handle.record("update users set name = ?", vec!["x".into()], None);
        assert_eq!(log.len(), 1);
    }
}
