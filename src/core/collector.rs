//! Exception collection
//!
//! Under the collect policy every record failure is stored here instead of
//! aborting the run, then rendered once, in encounter order, in the run summary.

use std::fmt;

/// A record failure deferred to the end of the run
#[derive(Debug)]
pub struct CollectedFailure {
    pub cause: anyhow::Error,
    pub verbose: bool,
    pub row_name: String,
    pub record: String,
}

impl CollectedFailure {
    pub fn new(
        cause: anyhow::Error,
        verbose: bool,
        row_name: impl Into<String>,
        record: impl Into<String>,
    ) -> Self {
        Self {
            cause,
            verbose,
            row_name: row_name.into(),
            record: record.into(),
        }
    }
}

impl fmt::Display for CollectedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", title_case(&self.row_name), self.record, self.cause)?;

        if self.verbose {
            for cause in self.cause.chain().skip(1) {
                write!(f, "\n  Caused by: {cause}")?;
            }
        }

        Ok(())
    }
}

/// Ordered list of collected failures for one run
#[derive(Debug, Default)]
pub struct ExceptionCollector {
    failures: Vec<CollectedFailure>,
}

impl ExceptionCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &mut self,
        cause: anyhow::Error,
        row_name: &str,
        record: String,
        verbose: bool,
    ) {
        tracing::warn!(
            row_name = %row_name,
            record = %record,
            error = %cause,
            "Collected record failure"
        );
        self.failures
            .push(CollectedFailure::new(cause, verbose, row_name, record));
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Formatted entries in insertion order
    pub fn render(&self) -> Vec<String> {
        self.failures.iter().map(ToString::to_string).collect()
    }

    /// Hand the failures over, leaving the collector empty
    pub fn take(&mut self) -> Vec<CollectedFailure> {
        std::mem::take(&mut self.failures)
    }
}

/// Capitalize the first letter of each word
pub fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
