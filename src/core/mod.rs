//! Core batch-processing engine.
//!
//! # Modules
//!
//! - [`source`] - Data sources producing counted, chunked records
//! - [`progress`] - Progress tracking and the step-mode pause
//! - [`collector`] - Record failures deferred to the end of a run
//! - [`diff`] - Before/after field diffs
//! - [`query_log`] - Per-run log of executed SQL
//! - [`transaction`] - Transaction scopes wrapping a run
//! - [`console`] - User-facing output and prompts
//! - [`runner`] - The orchestrator tying everything together
//!
//! # Example
//!
//! ```rust,no_run
//! use conveyor::core::runner::{BatchRunner, FnCommand, RunConfig};
//! use conveyor::core::source::memory::VecSource;
//!
//! # async fn example() {
//! let command = FnCommand::<String>::new("user")
//!     .with_query(|_| Ok(Box::new(VecSource::new(vec!["ada".to_string()]))))
//!     .with_handler(|name| {
//!         println!("Hello, {name}");
//!         Ok(())
//!     });
//!
//! let mut runner = BatchRunner::new(command, RunConfig::default());
//! let exit_code = runner.run().await;
//! # let _ = exit_code;
//! # }
//! ```

pub mod collector;
pub mod console;
pub mod diff;
pub mod progress;
pub mod query_log;
pub mod runner;
pub mod source;
pub mod transaction;
