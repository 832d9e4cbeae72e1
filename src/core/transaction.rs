//! Transaction scopes
//!
//! When a command asks for a transaction, the runner opens one scope around
//! the whole chunk-iteration loop. All chunks commit together or roll back
//! together.
//!
//! When failures are collected inside a transaction, each record's work is
//! bracketed by a savepoint so a failed record is undone on its own and the
//! transaction stays usable for the records after it.

use crate::domain::{BeltError, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

/// Begin/commit/rollback boundary wrapping one run
#[async_trait]
pub trait TransactionScope: Send + Sync {
    async fn begin(&self) -> Result<()>;

    async fn commit(&self) -> Result<()>;

    async fn rollback(&self) -> Result<()>;

    /// Mark the start of one record's work inside the open transaction
    async fn savepoint(&self) -> Result<()> {
        Ok(())
    }

    /// Keep the work done since [`TransactionScope::savepoint`]
    async fn release_savepoint(&self) -> Result<()> {
        Ok(())
    }

    /// Undo the work done since [`TransactionScope::savepoint`]
    async fn rollback_to_savepoint(&self) -> Result<()> {
        Ok(())
    }
}

/// Lifecycle of a [`RecordingTransaction`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionStatus {
    #[default]
    Idle,
    Open,
    Committed,
    RolledBack,
}

#[derive(Debug, Default)]
struct Recorded {
    status: TransactionStatus,
    pending: Vec<String>,
    persisted: Vec<String>,
    savepoint: Option<usize>,
}

impl Recorded {
    fn require_open(&self, action: &str) -> Result<()> {
        if self.status == TransactionStatus::Open {
            Ok(())
        } else {
            Err(BeltError::Transaction(format!(
                "No open transaction to {action}"
            )))
        }
    }

    fn take_savepoint(&mut self, action: &str) -> Result<usize> {
        self.require_open(action)?;
        self.savepoint.take().ok_or_else(|| {
            BeltError::Transaction(format!("No savepoint to {action}"))
        })
    }
}

/// In-memory scope for tests and dry runs
///
/// Writes staged through [`RecordingTransaction::stage`] become visible in
/// [`RecordingTransaction::persisted`] only on commit.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransaction {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Record a side effect. Outside an open transaction it persists at once.
    pub fn stage(&self, effect: impl Into<String>) {
        let mut inner = self.lock();
        let effect = effect.into();
        if inner.status == TransactionStatus::Open {
            inner.pending.push(effect);
        } else {
            inner.persisted.push(effect);
        }
    }

    pub fn status(&self) -> TransactionStatus {
        self.lock().status
    }

    pub fn persisted(&self) -> Vec<String> {
        self.lock().persisted.clone()
    }
}

#[async_trait]
impl TransactionScope for RecordingTransaction {
    async fn begin(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.status == TransactionStatus::Open {
            return Err(BeltError::Transaction(
                "Transaction already open".to_string(),
            ));
        }
        inner.status = TransactionStatus::Open;
        inner.pending.clear();
        inner.savepoint = None;
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.status != TransactionStatus::Open {
            return Err(BeltError::Transaction(
                "No open transaction to commit".to_string(),
            ));
        }
        let pending = std::mem::take(&mut inner.pending);
        inner.persisted.extend(pending);
        inner.status = TransactionStatus::Committed;
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.status != TransactionStatus::Open {
            return Err(BeltError::Transaction(
                "No open transaction to roll back".to_string(),
            ));
        }
        inner.pending.clear();
        inner.status = TransactionStatus::RolledBack;
        Ok(())
    }

    async fn savepoint(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.require_open("set a savepoint in")?;
        inner.savepoint = Some(inner.pending.len());
        Ok(())
    }

    async fn release_savepoint(&self) -> Result<()> {
        self.lock().take_savepoint("release").map(|_| ())
    }

    async fn rollback_to_savepoint(&self) -> Result<()> {
        let mut inner = self.lock();
        let mark = inner.take_savepoint("roll back to")?;
        inner.pending.truncate(mark);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commit_persists_staged_effects() {
        let tx = RecordingTransaction::new();
        tx.begin().await.unwrap();
        tx.stage("update A");
        tx.stage("update B");
        assert!(tx.persisted().is_empty());

        tx.commit().await.unwrap();
        assert_eq!(tx.status(), TransactionStatus::Committed);
        assert_eq!(tx.persisted(), vec!["update A", "update B"]);
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_effects() {
        let tx = RecordingTransaction::new();
        tx.begin().await.unwrap();
        tx.stage("update A");
        tx.rollback().await.unwrap();

        assert_eq!(tx.status(), TransactionStatus::RolledBack);
        assert!(tx.persisted().is_empty());
    }

    #[tokio::test]
    async fn test_stage_without_transaction_persists() {
        let tx = RecordingTransaction::new();
        tx.stage("update A");
        assert_eq!(tx.persisted(), vec!["update A"]);
    }

    #[tokio::test]
    async fn test_rollback_to_savepoint_discards_only_later_effects() {
        let tx = RecordingTransaction::new();
        tx.begin().await.unwrap();
        tx.stage("update A");

        tx.savepoint().await.unwrap();
        tx.stage("update B");
        tx.rollback_to_savepoint().await.unwrap();

        tx.savepoint().await.unwrap();
        tx.stage("update C");
        tx.release_savepoint().await.unwrap();

        tx.commit().await.unwrap();
        assert_eq!(tx.persisted(), vec!["update A", "update C"]);
    }

    #[tokio::test]
    async fn test_savepoint_needs_open_transaction() {
        let tx = RecordingTransaction::new();
        assert!(tx.savepoint().await.is_err());

        tx.begin().await.unwrap();
        assert!(tx.release_savepoint().await.is_err());
    }

    #[tokio::test]
    async fn test_commit_without_begin_fails() {
        let tx = RecordingTransaction::new();
        assert!(matches!(
            tx.commit().await,
            Err(BeltError::Transaction(_))
        ));
    }
}
