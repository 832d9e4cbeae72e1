//! Transaction scope over a session

use super::session::PgSession;
use crate::core::transaction::TransactionScope;
use crate::domain::{BeltError, Result};
use async_trait::async_trait;

/// Savepoint bracketing one record when failures are collected
pub const RECORD_SAVEPOINT: &str = "conveyor_record";

/// Issues BEGIN/COMMIT/ROLLBACK on the run's shared connection
///
/// Savepoint statements stay out of the query log; `--log-sql` shows the
/// record's own statements.
#[derive(Clone)]
pub struct PgTransaction {
    session: PgSession,
}

impl PgTransaction {
    pub fn new(session: PgSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl TransactionScope for PgTransaction {
    async fn begin(&self) -> Result<()> {
        self.session
            .batch_execute("BEGIN")
            .await
            .map_err(|e| BeltError::Transaction(format!("Failed to begin: {e}")))
    }

    async fn commit(&self) -> Result<()> {
        self.session
            .batch_execute("COMMIT")
            .await
            .map_err(|e| BeltError::Transaction(format!("Failed to commit: {e}")))
    }

    async fn rollback(&self) -> Result<()> {
        self.session
            .batch_execute("ROLLBACK")
            .await
            .map_err(|e| BeltError::Transaction(format!("Failed to roll back: {e}")))
    }

    async fn savepoint(&self) -> Result<()> {
        self.session
            .control(&savepoint_sql(SavepointAction::Set))
            .await
            .map_err(|e| BeltError::Transaction(format!("Failed to set savepoint: {e}")))
    }

    async fn release_savepoint(&self) -> Result<()> {
        self.session
            .control(&savepoint_sql(SavepointAction::Release))
            .await
            .map_err(|e| BeltError::Transaction(format!("Failed to release savepoint: {e}")))
    }

    async fn rollback_to_savepoint(&self) -> Result<()> {
        self.session
            .control(&savepoint_sql(SavepointAction::RollbackTo))
            .await
            .map_err(|e| {
                BeltError::Transaction(format!("Failed to roll back to savepoint: {e}"))
            })
    }
}

#[derive(Debug, Clone, Copy)]
enum SavepointAction {
    Set,
    Release,
    RollbackTo,
}

fn savepoint_sql(action: SavepointAction) -> String {
    let verb = match action {
        SavepointAction::Set => "SAVEPOINT",
        SavepointAction::Release => "RELEASE SAVEPOINT",
        SavepointAction::RollbackTo => "ROLLBACK TO SAVEPOINT",
    };
    format!("{verb} {RECORD_SAVEPOINT}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_savepoint_statements() {
        assert_eq!(savepoint_sql(SavepointAction::Set), "SAVEPOINT conveyor_record");
        assert_eq!(
            savepoint_sql(SavepointAction::Release),
            "RELEASE SAVEPOINT conveyor_record"
        );
        assert_eq!(
            savepoint_sql(SavepointAction::RollbackTo),
            "ROLLBACK TO SAVEPOINT conveyor_record"
        );
    }
}
