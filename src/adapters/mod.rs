//! External system integrations.
//!
//! - [`postgresql`] - Pooled PostgreSQL sessions, a query-backed data source
//!   and a transaction scope
//!
//! # Example
//!
//! ```rust,no_run
//! use conveyor::adapters::postgresql::{PgQuerySource, PostgreSQLClient};
//! use conveyor::config::load_config;
//! use conveyor::core::source::QueryText;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("conveyor.toml")?;
//! let client = PostgreSQLClient::new(config.postgresql.ok_or("no [postgresql] section")?)?;
//! let session = client.session().await?;
//!
//! let source = PgQuerySource::new(session, QueryText::new("select * from users", vec![]))
//!     .chunk_by_id("id");
//! # let _ = source;
//! # Ok(())
//! # }
//! ```

pub mod postgresql;
