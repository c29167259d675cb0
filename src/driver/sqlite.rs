//! SQLite binding of the [`Driver`](super::Driver) contract.

use async_trait::async_trait;
use sqlx::any::AnyArguments;
use sqlx::{Any, Connection as _, Executor as _};
use std::time::Duration;

use super::{bind_any_value, row_from_any, Driver, ExecResult};
use crate::error::{Error, Result};
use crate::statement::{Row, Value};

type AnyConnection = <Any as sqlx::Database>::Connection;

/// SQLite connection parameters, keyword-bag style.
#[derive(Debug, Clone)]
pub struct SqliteParams {
    /// A filesystem path, or the literal `:memory:`.
    pub database: String,
    pub timeout: Duration,
}

impl Default for SqliteParams {
    fn default() -> Self {
        SqliteParams {
            database: ":memory:".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

fn connect_url(params: &SqliteParams) -> String {
    if params.database == ":memory:" {
        "sqlite::memory:".to_string()
    } else {
        format!("sqlite://{}", params.database)
    }
}

/// Statement kinds that return rows rather than just an affected-row count.
fn returns_rows(sql: &str) -> bool {
    let s = sql.trim_start().to_ascii_uppercase();
    s.starts_with("SELECT")
        || s.starts_with("PRAGMA")
        || s.starts_with("WITH")
        || s.starts_with("EXPLAIN")
}

pub struct SqliteDriver {
    params: SqliteParams,
    conn: Option<AnyConnection>,
    rows: Vec<Row>,
    rows_affected: u64,
    last_insert_id: i64,
}

impl SqliteDriver {
    pub fn new(params: SqliteParams) -> Self {
        SqliteDriver {
            params,
            conn: None,
            rows: Vec::new(),
            rows_affected: 0,
            last_insert_id: 0,
        }
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    async fn connect(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        sqlx::any::install_default_drivers();
        let url = connect_url(&self.params);
        log::debug!("connecting sqlite driver to {url}");
        let conn = AnyConnection::connect(&url)
            .await
            .map_err(|e| Error::driver_exception("sqlite", e))?;
        self.conn = Some(conn);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .await
                .map_err(|e| Error::driver_exception("sqlite", e))?;
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.rows.clear();
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        let mut args = AnyArguments::default();
        for p in params {
            bind_any_value(&mut args, p)?;
        }

        log::trace!("sqlite execute: {sql} ({} params)", params.len());
        let param_strs: Vec<String> = params.iter().map(|v| format!("{v:?}")).collect();
        let conn = self.conn.as_mut().ok_or(Error::ConnectionClosed)?;

        if returns_rows(sql) {
            let rows = conn
                .fetch_all(sqlx::query_with(sql, args))
                .await
                .map_err(|e| Error::execute_exception("sqlite", e, sql, &param_strs))?;
            self.rows_affected = rows.len() as u64;
            self.rows = rows.iter().map(row_from_any).collect();
        } else {
            let result = conn
                .execute(sqlx::query_with(sql, args))
                .await
                .map_err(|e| Error::execute_exception("sqlite", e, sql, &param_strs))?;
            self.rows_affected = result.rows_affected();
            self.rows.clear();

            // sqlx's `Any` layer doesn't surface SQLite's rowid through
            // `AnyQueryResult`, unlike MySQL's `last_insert_id()`; ask the
            // connection directly.
            if sql.trim_start().to_ascii_uppercase().starts_with("INSERT") {
                use sqlx::Row as _;
                if let Ok(row) = conn.fetch_one("SELECT last_insert_rowid()").await {
                    self.last_insert_id = row.try_get::<i64, usize>(0).unwrap_or(0);
                }
            }
        }

        Ok(ExecResult {
            rows_affected: self.rows_affected,
            last_insert_id: self.last_insert_id,
        })
    }

    fn iterate(&mut self) -> std::vec::IntoIter<Row> {
        std::mem::take(&mut self.rows).into_iter()
    }

    fn row_count(&self) -> u64 {
        self.rows_affected
    }

    fn last_insert_id(&self) -> i64 {
        self.last_insert_id
    }

    async fn begin_transaction(&mut self) -> Result<()> {
        self.execute_and_clear("BEGIN").await
    }

    async fn commit(&mut self) -> Result<()> {
        self.execute_and_clear("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.execute_and_clear("ROLLBACK").await
    }

    fn escape_string(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn error_code(&self) -> Option<String> {
        crate::error::not_implemented_warning("SQLite does not expose a standalone error code");
        None
    }

    fn error_info(&self) -> Option<String> {
        None
    }

    fn get_server_version_info(&self) -> (u32, u32, u32) {
        (3, 0, 0)
    }

    fn get_name(&self) -> &'static str {
        "sqlite"
    }

    fn get_placeholder(&self) -> &'static str {
        "?"
    }
}
