// Conveyor - Record-by-record batch runner
// Copyright (c) 2025 Conveyor Contributors
// Licensed under the MIT License

//! # Conveyor - record-by-record batch runner
//!
//! Conveyor drives a command over every record a data source yields, one
//! chunk at a time, with a progress bar and a handful of run modes for
//! inspecting what the command does before trusting it with real data.
//!
//! ## Overview
//!
//! - **Sources** count their records and hand them out in chunks
//!   ([`core::source`]); PostgreSQL queries and JSON files ship in the box
//! - **Commands** implement [`core::runner::BatchCommand`]: a query, a row
//!   handler and optional lifecycle hooks
//! - **The runner** ([`core::runner::BatchRunner`]) owns the state machine:
//!   transaction scope, fail-fast or collected failures, and the run modes
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - The runner, sources, progress, diffs, failure collection
//! - [`adapters`] - PostgreSQL integration
//! - [`domain`] - Records, bindings and error types
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Run modes
//!
//! | Flag         | Effect                                                  |
//! |--------------|---------------------------------------------------------|
//! | `--dump-sql` | Print the query with bindings substituted, then stop    |
//! | `--log-sql`  | Show the SQL each record triggered (implies `--step`)   |
//! | `--step`     | Ask for confirmation after each record                  |
//! | `--diff`     | Show the fields each record changed                     |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use conveyor::core::runner::{BatchRunner, FnCommand, RunConfig};
//! use conveyor::core::source::memory::VecSource;
//!
//! #[tokio::main]
//! async fn main() {
//!     let command = FnCommand::<String>::new("invoice")
//!         .with_query(|_| {
//!             let ids = (1..=3).map(|i| format!("INV-{i}")).collect();
//!             Ok(Box::new(VecSource::new(ids)))
//!         })
//!         .with_handler(|invoice| {
//!             tracing::info!(%invoice, "Sending reminder");
//!             Ok(())
//!         })
//!         .collecting_exceptions(true);
//!
//!     let mut runner = BatchRunner::new(command, RunConfig::default());
//!     std::process::exit(runner.run().await);
//! }
//! ```
//!
//! ## Error Handling
//!
//! Library operations return [`domain::Result`], whose error is
//! [`domain::BeltError`]. Row handlers return `anyhow::Result` so that any
//! error type can fail a record.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
