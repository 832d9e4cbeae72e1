//! Batch runner
//!
//! [`BatchRunner`] drives a [`BatchCommand`] through one run:
//!
//! 1. verify the command's wiring
//! 2. prepare: enable the query log, run `before_first_row`, honour `--dump-sql`
//! 3. count records; stop early when nothing matches
//! 4. iterate chunks inside an optional transaction scope, presenting each
//!    record (diff snapshot, handler, progress, SQL log, diff table, step pause);
//!    collected failures inside a transaction are undone to a per-record
//!    savepoint
//! 5. finish progress and run `after_last_row`
//! 6. summarize collected failures
//!
//! Every fatal path unwinds to [`BatchRunner::run`], which renders it and maps
//! it to a [`RunResult`] and an exit code.

pub mod closure;
pub mod command;

pub use closure::FnCommand;
pub use command::{BatchCommand, DEFAULT_CHUNK_SIZE};

use crate::core::collector::{title_case, ExceptionCollector};
use crate::core::console::{Console, TerminalConsole};
use crate::core::diff::DiffReporter;
use crate::core::progress::{ProgressDraw, ProgressReporter};
use crate::core::query_log::QueryLog;
use crate::core::source::DataSource;
use crate::core::transaction::TransactionScope;
use crate::domain::{BeltError, Record, Result};
use std::fmt;
use tracing::{debug, error, info, warn};

/// Exit code for a successful run
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for a failed or cancelled run
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for a misconfigured command
pub const EXIT_INVALID: i32 = 2;

/// Flags requested for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunConfig {
    /// Pause for confirmation after each record
    pub step_mode: bool,
    /// Show field changes after each record
    pub diff_mode: bool,
    /// Show SQL executed for each record; implies step mode
    pub sql_log_mode: bool,
    /// Print the query and exit without processing
    pub dump_query_only: bool,
    /// Render collected failures with their cause chain
    pub verbose: bool,
}

impl RunConfig {
    /// Resolve flag implications and the command's policy toggles
    pub fn resolve<C: BatchCommand + ?Sized>(&self, command: &C) -> RunSettings {
        let step_mode = self.step_mode || self.sql_log_mode;
        RunSettings {
            step_mode,
            collect_exceptions: command.collect_exceptions(),
            diff_mode: self.diff_mode,
            sql_log_mode: self.sql_log_mode,
            use_transaction: command.use_transaction(),
            dump_query_only: self.dump_query_only,
            verbose: self.verbose || step_mode,
        }
    }
}

/// Immutable settings for a run, resolved once at start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    pub step_mode: bool,
    pub collect_exceptions: bool,
    pub diff_mode: bool,
    pub sql_log_mode: bool,
    pub use_transaction: bool,
    pub dump_query_only: bool,
    pub verbose: bool,
}

/// Terminal outcome of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResult {
    Succeeded,
    NoMatchingRecords,
    AbortedByUser { message: Option<String> },
    AbortedByMisconfiguration { message: String },
    FailedWithCollectedExceptions(usize),
    /// Fail-fast record failure or infrastructure error
    Fatal { message: String },
}

impl RunResult {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunResult::Succeeded | RunResult::NoMatchingRecords => EXIT_SUCCESS,
            RunResult::AbortedByMisconfiguration { .. } => EXIT_INVALID,
            RunResult::AbortedByUser { .. }
            | RunResult::FailedWithCollectedExceptions(_)
            | RunResult::Fatal { .. } => EXIT_FAILURE,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == EXIT_SUCCESS
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunResult::Succeeded => write!(f, "succeeded"),
            RunResult::NoMatchingRecords => write!(f, "no matching records"),
            RunResult::AbortedByUser { .. } => write!(f, "aborted by user"),
            RunResult::AbortedByMisconfiguration { .. } => write!(f, "aborted by misconfiguration"),
            RunResult::FailedWithCollectedExceptions(n) => {
                write!(f, "failed with {n} collected exception(s)")
            }
            RunResult::Fatal { .. } => write!(f, "failed"),
        }
    }
}

/// Orchestrates one command over its data source
pub struct BatchRunner<C: BatchCommand> {
    command: C,
    config: RunConfig,
    console: Box<dyn Console>,
    progress: ProgressReporter,
    collector: ExceptionCollector,
    query_log: QueryLog,
    result: Option<RunResult>,
}

impl<C: BatchCommand> BatchRunner<C> {
    /// Runner writing to the terminal with a drawn progress bar
    pub fn new(command: C, config: RunConfig) -> Self {
        Self {
            command,
            config,
            console: Box::new(TerminalConsole::new()),
            progress: ProgressReporter::new(ProgressDraw::Stderr),
            collector: ExceptionCollector::new(),
            query_log: QueryLog::new(),
            result: None,
        }
    }

    pub fn with_console(mut self, console: impl Console + 'static) -> Self {
        self.console = Box::new(console);
        self
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn command(&self) -> &C {
        &self.command
    }

    pub fn into_command(self) -> C {
        self.command
    }

    /// Outcome of the last run, if any
    pub fn result(&self) -> Option<&RunResult> {
        self.result.as_ref()
    }

    pub fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    /// Execute the run and return its exit code
    pub async fn run(&mut self) -> i32 {
        let settings = self.config.resolve(&self.command);
        self.collector = ExceptionCollector::new();
        self.query_log.drain();

        info!(
            row_name = %self.command.row_name(),
            step_mode = settings.step_mode,
            collect_exceptions = settings.collect_exceptions,
            use_transaction = settings.use_transaction,
            diff_mode = settings.diff_mode,
            sql_log_mode = settings.sql_log_mode,
            dump_query_only = settings.dump_query_only,
            "Starting run"
        );

        let outcome = self.execute(&settings).await;
        let result = self.conclude(outcome);
        let code = result.exit_code();

        info!(result = %result, exit_code = code, "Run finished");
        self.result = Some(result);
        code
    }

    async fn execute(&mut self, settings: &RunSettings) -> Result<RunResult> {
        self.verify_setup(settings)?;

        self.query_log.set_enabled(settings.sql_log_mode);
        self.command.before_first_row().await?;
        let mut source = self.command.query(&self.query_log).await?;

        if settings.dump_query_only {
            return Err(self.dump_query(source.as_ref()));
        }

        self.print_intro(settings);

        let total = source.count().await?;
        info!(total, "Counted records");

        if total == 0 {
            let plural = self.command.row_name_plural();
            self.console
                .info(&format!("There are no {plural} that match your query."));
            self.command.after_last_row().await?;
            return Ok(RunResult::NoMatchingRecords);
        }

        self.progress.start(total, &self.command.row_name_plural());
        let processed = self.process_in_scope(source.as_mut(), settings).await;
        self.progress.finish();
        processed?;

        self.command.after_last_row().await?;

        if !self.collector.is_empty() {
            return Err(BeltError::AggregateFailure {
                failures: self.collector.take(),
            });
        }

        Ok(RunResult::Succeeded)
    }

    fn verify_setup(&self, settings: &RunSettings) -> Result<()> {
        self.command.check_wiring()?;

        if settings.use_transaction && self.command.transaction_scope().is_none() {
            return Err(BeltError::Misconfigured(format!(
                "The {} command uses a transaction but provides no transaction scope",
                self.command.row_name()
            )));
        }

        if self.command.chunk_size() == 0 {
            return Err(BeltError::Misconfigured(
                "Chunk size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    fn dump_query(&mut self, source: &dyn DataSource<C::Record>) -> BeltError {
        match source.query_text() {
            Some(query) => {
                self.console.line(&query.render());
                BeltError::silent_abort()
            }
            None => BeltError::Misconfigured(format!(
                "The --dump-sql flag requires a query-backed data source, and the {} source has no query text",
                self.command.row_name()
            )),
        }
    }

    fn print_intro(&mut self, settings: &RunSettings) {
        let status = if settings.use_transaction {
            "(using a database transaction)"
        } else {
            "(no database transaction)"
        };
        let plural = self.command.row_name_plural();
        self.console.info(&format!("Querying {plural} {status}..."));
    }

    async fn process_in_scope(
        &mut self,
        source: &mut dyn DataSource<C::Record>,
        settings: &RunSettings,
    ) -> Result<()> {
        if !settings.use_transaction {
            return self.process(source, settings, None).await;
        }

        let scope = self.command.transaction_scope().ok_or_else(|| {
            BeltError::Misconfigured("Transaction scope disappeared during run".to_string())
        })?;

        scope.begin().await?;
        debug!("Transaction opened");

        let record_scope = settings.collect_exceptions.then_some(scope.as_ref());
        match self.process(source, settings, record_scope).await {
            Ok(()) => {
                scope.commit().await?;
                info!("Transaction committed");
                Ok(())
            }
            Err(err) => {
                if let Err(rollback) = scope.rollback().await {
                    error!(error = %rollback, "Failed to roll back transaction");
                } else {
                    info!(reason = %err, "Transaction rolled back");
                }
                Err(err)
            }
        }
    }

    async fn process(
        &mut self,
        source: &mut dyn DataSource<C::Record>,
        settings: &RunSettings,
        record_scope: Option<&dyn TransactionScope>,
    ) -> Result<()> {
        self.command.before_first_query().await?;

        let chunk_size = self.command.chunk_size();
        while let Some(mut chunk) = source.next_chunk(chunk_size).await? {
            let state = self.progress.state();
            crate::log_chunk_fetched!(chunk.index(), chunk.len(), state.completed, state.total);
            self.command.prepare_chunk(&mut chunk).await?;

            for mut record in chunk.into_records() {
                self.present(&mut record, settings, record_scope).await?;
            }
        }

        Ok(())
    }

    async fn present(
        &mut self,
        record: &mut C::Record,
        settings: &RunSettings,
        record_scope: Option<&dyn TransactionScope>,
    ) -> Result<()> {
        let row_name = self.command.row_name();
        let diff = DiffReporter::new(settings.diff_mode);
        let before = diff.capture_before(&*record, &row_name)?;

        if let Err(cause) = self.handle(record, record_scope).await? {
            let identity = record.describe();
            if !settings.collect_exceptions {
                error!(row_name = %row_name, record = %identity, error = %cause, "Record failed");
                return Err(BeltError::RecordFailure {
                    row_name,
                    record: identity,
                    source: cause,
                });
            }
            self.collector
                .append(cause, &row_name, identity, settings.verbose);
        }

        self.progress.advance();

        if settings.sql_log_mode {
            self.flush_query_log();
        }

        if diff.is_enabled() {
            let rows = diff.render_diff(&*record, &before, &row_name)?;
            let cells: Vec<Vec<String>> = rows.iter().map(|row| row.cells()).collect();
            self.console
                .section(&format!("Changes to {}", title_case(&row_name)));
            self.console.table(&["", "Original", "Updated"], &cells);
        }

        if settings.step_mode
            && !self
                .progress
                .pause_for_confirmation(self.console.as_mut(), "Continue?")
                .await?
        {
            return Err(BeltError::abort("Operation cancelled."));
        }

        Ok(())
    }

    /// Run the handler, inside a savepoint when one is asked for
    async fn handle(
        &mut self,
        record: &mut C::Record,
        record_scope: Option<&dyn TransactionScope>,
    ) -> Result<anyhow::Result<()>> {
        let Some(scope) = record_scope else {
            return Ok(self.command.handle_row(record).await);
        };

        scope.savepoint().await?;
        let handled = self.command.handle_row(record).await;
        match handled {
            Ok(()) => scope.release_savepoint().await?,
            Err(_) => {
                scope.rollback_to_savepoint().await?;
                debug!(record = %record.describe(), "Rolled back to record savepoint");
            }
        }
        Ok(handled)
    }

    fn flush_query_log(&mut self) {
        self.console.section("SQL Queries Executed");
        for entry in self.query_log.drain() {
            let sql = entry.query.render();
            match entry.duration {
                Some(duration) => self
                    .console
                    .line(&format!("{sql} ({:.2} ms)", duration.as_secs_f64() * 1000.0)),
                None => self.console.line(&sql),
            }
        }
    }

    /// Map the run's outcome onto a result, rendering whatever the user must see
    fn conclude(&mut self, outcome: Result<RunResult>) -> RunResult {
        let err = match outcome {
            Ok(result) => return result,
            Err(err) => err,
        };

        match err {
            BeltError::Misconfigured(message) => {
                self.console.error(&message);
                RunResult::AbortedByMisconfiguration { message }
            }
            BeltError::UserAbort { message } => {
                if let Some(message) = &message {
                    self.console.error(message);
                }
                RunResult::AbortedByUser { message }
            }
            BeltError::AggregateFailure { failures } => {
                self.console.section("Exceptions Triggered During Run");
                for failure in &failures {
                    self.console.error(&failure.to_string());
                }
                warn!(failures = failures.len(), "Run finished with collected failures");
                RunResult::FailedWithCollectedExceptions(failures.len())
            }
            other => {
                let message = other.to_string();
                self.console.error(&message);
                RunResult::Fatal { message }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::console::BufferedConsole;
    use crate::core::source::memory::VecSource;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_log_sql_implies_step_and_step_implies_verbose() {
        let command = FnCommand::<String>::new("row");
        let settings = RunConfig {
            sql_log_mode: true,
            ..RunConfig::default()
        }
        .resolve(&command);

        assert!(settings.step_mode);
        assert!(settings.verbose);
        assert!(!settings.collect_exceptions);
    }

    #[test]
    fn test_policy_toggles_come_from_command() {
        let command = FnCommand::<String>::new("row")
            .collecting_exceptions(true)
            .requires_transaction(true);
        let settings = RunConfig::default().resolve(&command);
        assert!(settings.collect_exceptions);
        assert!(settings.use_transaction);
        assert!(!settings.verbose);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunResult::Succeeded.exit_code(), 0);
        assert_eq!(RunResult::NoMatchingRecords.exit_code(), 0);
        assert_eq!(RunResult::AbortedByUser { message: None }.exit_code(), 1);
        assert_eq!(RunResult::FailedWithCollectedExceptions(2).exit_code(), 1);
        assert_eq!(
            RunResult::AbortedByMisconfiguration {
                message: String::new()
            }
            .exit_code(),
            2
        );
    }

    #[tokio::test]
    async fn test_run_prints_intro_and_processes_all() {
        let console = BufferedConsole::new();
        let command = FnCommand::<String>::new("user")
            .with_query(|_| Ok(Box::new(VecSource::new(names(&["A", "B", "C"])))))
            .with_handler(|_| Ok(()))
            .with_chunk_size(2);

        let mut runner = BatchRunner::new(command, RunConfig::default())
            .with_console(console.clone())
            .with_progress(ProgressReporter::hidden());

        assert_eq!(runner.run().await, EXIT_SUCCESS);
        assert_eq!(runner.result(), Some(&RunResult::Succeeded));
        assert_eq!(runner.progress().state().completed, 3);
        assert!(console.contains("Querying users (no database transaction)..."));
    }

    #[tokio::test]
    async fn test_missing_scope_is_misconfigured() {
        let console = BufferedConsole::new();
        let command = FnCommand::<String>::new("user")
            .with_query(|_| Ok(Box::new(VecSource::new(names(&["A"])))))
            .with_handler(|_| Ok(()))
            .requires_transaction(true);

        let mut runner = BatchRunner::new(command, RunConfig::default())
            .with_console(console.clone())
            .with_progress(ProgressReporter::hidden());

        assert_eq!(runner.run().await, EXIT_INVALID);
        assert!(matches!(
            runner.result(),
            Some(RunResult::AbortedByMisconfiguration { .. })
        ));
        assert_eq!(console.errors().len(), 1);
    }
}
