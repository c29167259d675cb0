//! # dbal
//!
//! A thin, dialect-aware database abstraction layer over MySQL and SQLite,
//! built on top of [sqlx](https://github.com/launchbadge/sqlx)'s `Any` driver.
//!
//! ## Features
//!
//! - **Async & non-blocking**, built on `tokio` and `sqlx`
//! - **Two-driver support**: MySQL and SQLite, behind one connection type
//! - **Fluent SQL builder**: chainable SELECT/INSERT/UPDATE/DELETE assembly
//! - **Transaction nesting**: savepoint-backed or flag-tracked, your choice
//! - **Schema introspection**: tables, columns, indexes, foreign keys, cached
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use dbal::connection::{Connection, DriverParams};
//! use dbal::driver::sqlite::SqliteParams;
//!
//! # async fn run() -> dbal::error::Result<()> {
//! let mut conn = Connection::connect(
//!     "sqlite",
//!     DriverParams::Sqlite(SqliteParams::default()),
//!     true,
//! )
//! .await?;
//!
//! conn.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", Default::default())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod connection;
pub mod driver;
pub mod error;
pub mod expr;
pub mod platform;
pub mod pool;
pub mod schema;
pub mod statement;
pub mod types;

pub use builder::{ExecuteOutcome, SQLBuilder, StatementKind};
pub use connection::{Connection, DriverParams, IsolationLevel};
pub use driver::{Driver, KNOWN_DRIVERS};
pub use error::{Error, Result};
pub use expr::{CompositeExpression, CompositeType, ExpressionBuilder};
pub use platform::Platform;
pub use pool::{PoolConfig, SafePool};
pub use schema::SchemaManager;
pub use statement::{FetchMode, Params, Projected, Row, Value};
pub use types::BaseType;
