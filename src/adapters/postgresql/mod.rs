//! PostgreSQL integration
//!
//! A [`PostgreSQLClient`] owns the connection pool. Each run checks out one
//! [`PgSession`], which the data source, the row handler and the transaction
//! scope share so that all of them see the same transaction.

pub mod client;
pub mod row;
pub mod session;
pub mod source;
pub mod transaction;

pub use client::PostgreSQLClient;
pub use session::PgSession;
pub use source::{ChunkStrategy, PgQuerySource};
pub use transaction::PgTransaction;
