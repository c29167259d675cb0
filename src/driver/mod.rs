//! Abstract contract for engine-specific I/O.
//!
//! A [`Driver`] is the opaque capability set that [`crate::connection::Connection`],
//! [`crate::statement`] and the platform layer call into. It owns the one live
//! `sqlx::Any` connection for this engine and knows nothing about SQL building
//! or transaction nesting — that lives one layer up, in `Connection`.

pub mod mysql;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::statement::{Row, Value};

/// Outcome of a non-SELECT statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub last_insert_id: i64,
}

/// The short names this crate's driver registry understands.
pub const KNOWN_DRIVERS: &[&str] = &["mysql", "sqlite"];

/// Engine-specific I/O. One instance is owned per [`crate::connection::Connection`].
///
/// Implementations are not expected to be `Clone`: a driver owns exactly one
/// live connection and one active result cursor at a time.
#[async_trait]
pub trait Driver: Send {
    /// Opens the underlying connection. Idempotent if already connected.
    async fn connect(&mut self) -> Result<()>;

    /// Closes the underlying connection. Idempotent.
    async fn close(&mut self) -> Result<()>;

    /// Releases any buffered result rows from the last `execute`.
    fn clear(&mut self);

    fn is_connected(&self) -> bool;

    /// Runs `sql` with `params` already rewritten to this driver's native
    /// placeholder. For SELECT, result rows are buffered and retrievable via
    /// [`Driver::iterate`]; for everything else `rows_affected`/`last_insert_id`
    /// on the returned [`ExecResult`] are meaningful.
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ExecResult>;

    /// Consumes and returns the rows buffered by the last `execute`. Forward-only:
    /// calling this a second time without a new `execute` yields an empty iterator.
    fn iterate(&mut self) -> std::vec::IntoIter<Row>;

    fn row_count(&self) -> u64;

    fn last_insert_id(&self) -> i64;

    async fn begin_transaction(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// Runs `sql` for side effect only (e.g. `SAVEPOINT x`) and clears the cursor.
    async fn execute_and_clear(&mut self, sql: &str) -> Result<()> {
        self.execute(sql, &[]).await?;
        self.clear();
        Ok(())
    }

    fn escape_string(&self, value: &str) -> String;

    fn error_code(&self) -> Option<String>;

    fn error_info(&self) -> Option<String>;

    /// `(major, minor, patch)` server version, queried lazily on connect.
    fn get_server_version_info(&self) -> (u32, u32, u32);

    fn get_name(&self) -> &'static str;

    /// This engine's native positional placeholder token.
    fn get_placeholder(&self) -> &'static str;
}

/// Decodes one `sqlx::any::AnyRow` into the engine-neutral [`Row`] shape,
/// guessing a Rust type per column by trying the common SQL scalar kinds in
/// turn. `sqlx::Any` erases the underlying column type, so decoding has to
/// attempt and fall through rather than dispatch on a known type.
pub(crate) fn row_from_any(row: &sqlx::any::AnyRow) -> Row {
    use sqlx::{Column, Row as _};

    let mut columns = Vec::with_capacity(row.columns().len());
    let mut values = Vec::with_capacity(row.columns().len());

    for (i, col) in row.columns().iter().enumerate() {
        columns.push(col.name().to_string());
        values.push(decode_any_value(row, i));
    }

    Row { columns, values }
}

fn decode_any_value(row: &sqlx::any::AnyRow, i: usize) -> Value {
    use sqlx::Row as _;

    if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
        return v.map(Value::Int).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
        return v.map(Value::Float).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(i) {
        return v.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(i) {
        return v.map(Value::Text).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(i) {
        return v.map(Value::Blob).unwrap_or(Value::Null);
    }
    Value::Null
}

/// Appends `value` to `args`, erasing it into whichever native type the
/// `sqlx::Any` layer can carry across every backend.
pub(crate) fn bind_any_value<'q>(
    args: &mut sqlx::any::AnyArguments<'q>,
    value: &Value,
) -> Result<()> {
    use sqlx::Arguments;

    match value.clone() {
        Value::Null => {
            let _ = args.add(Option::<i64>::None);
        }
        Value::Bool(b) => {
            let _ = args.add(b);
        }
        Value::Int(i) => {
            let _ = args.add(i);
        }
        Value::Float(f) => {
            let _ = args.add(f);
        }
        Value::Text(s) => {
            let _ = args.add(s);
        }
        Value::Blob(b) => {
            let _ = args.add(b);
        }
        Value::List(_) => {
            // Lists are expanded into individual placeholders by the statement
            // rewriter before binding ever sees them.
            return Err(crate::error::Error::invalid_argument(
                "list values must be expanded before binding",
            ));
        }
    }
    Ok(())
}
