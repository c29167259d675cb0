//! MySQL binding of the [`Driver`](super::Driver) contract.
//!
//! Adds the one piece of behavior the generic driver contract doesn't have:
//! a single transparent reconnect-and-retry when the server drops the
//! connection mid-`execute` (MySQL error codes 2006/2013/2055).

use async_trait::async_trait;
use sqlx::any::AnyArguments;
use sqlx::{Any, Connection as _, Executor as _};
use std::time::Duration;

use super::{bind_any_value, row_from_any, Driver, ExecResult};
use crate::error::{Error, Result};
use crate::statement::{Row, Value};

type AnyConnection = <Any as sqlx::Database>::Connection;

/// MySQL connection parameters, keyword-bag style.
#[derive(Debug, Clone)]
pub struct MySqlParams {
    /// If this contains `/`, it is treated as a unix socket path.
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub port: u16,
    pub timeout: Duration,
    pub charset: String,
    pub timezone: String,
    pub sql_mode: String,
}

impl Default for MySqlParams {
    fn default() -> Self {
        MySqlParams {
            host: "localhost".to_string(),
            user: String::new(),
            password: String::new(),
            database: String::new(),
            port: 3306,
            timeout: Duration::from_secs(30),
            charset: "utf8".to_string(),
            timezone: "SYSTEM".to_string(),
            sql_mode: "TRADITIONAL".to_string(),
        }
    }
}

fn connect_url(params: &MySqlParams) -> String {
    if params.host.contains('/') {
        format!(
            "mysql://{}:{}@/{}?socket={}",
            params.user, params.password, params.database, params.host
        )
    } else {
        format!(
            "mysql://{}:{}@{}:{}/{}?charset={}",
            params.user, params.password, params.host, params.port, params.database, params.charset
        )
    }
}

/// Error numbers that indicate the server dropped the connection, not a
/// genuine statement failure: `CR_SERVER_GONE_ERROR`, `CR_SERVER_LOST`,
/// `CR_SERVER_LOST_EXTENDED`.
const LOST_CONNECTION_CODES: &[&str] = &["2006", "2013", "2055"];

fn is_lost_connection(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .map(|c| LOST_CONNECTION_CODES.contains(&c.as_ref()))
            .unwrap_or(false),
        sqlx::Error::Io(_) | sqlx::Error::PoolClosed => true,
        _ => false,
    }
}

fn returns_rows(sql: &str) -> bool {
    let s = sql.trim_start().to_ascii_uppercase();
    s.starts_with("SELECT") || s.starts_with("SHOW") || s.starts_with("WITH") || s.starts_with("EXPLAIN")
}

pub struct MySqlDriver {
    params: MySqlParams,
    conn: Option<AnyConnection>,
    rows: Vec<Row>,
    rows_affected: u64,
    last_insert_id: i64,
    server_version: (u32, u32, u32),
}

impl MySqlDriver {
    pub fn new(params: MySqlParams) -> Self {
        MySqlDriver {
            params,
            conn: None,
            rows: Vec::new(),
            rows_affected: 0,
            last_insert_id: 0,
            server_version: (0, 0, 0),
        }
    }

    fn conn_mut(&mut self) -> Result<&mut AnyConnection> {
        self.conn.as_mut().ok_or(Error::ConnectionClosed)
    }

    async fn run_once(&mut self, sql: &str, args: AnyArguments<'_>) -> std::result::Result<ExecResult, sqlx::Error> {
        let row_returning = returns_rows(sql);
        let conn = self.conn.as_mut().expect("connection checked by caller");

        if row_returning {
            let rows = conn.fetch_all(sqlx::query_with(sql, args)).await?;
            self.rows_affected = rows.len() as u64;
            self.rows = rows.iter().map(row_from_any).collect();
        } else {
            let result = conn.execute(sqlx::query_with(sql, args)).await?;
            self.rows_affected = result.rows_affected();
            self.last_insert_id = result.last_insert_id().unwrap_or(0);
            self.rows.clear();
        }

        Ok(ExecResult {
            rows_affected: self.rows_affected,
            last_insert_id: self.last_insert_id,
        })
    }
}

#[async_trait]
impl Driver for MySqlDriver {
    async fn connect(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        sqlx::any::install_default_drivers();
        let url = connect_url(&self.params);
        log::debug!("connecting mysql driver to {}:{}", self.params.host, self.params.port);
        let mut conn = AnyConnection::connect(&url)
            .await
            .map_err(|e| Error::driver_exception("mysql", e))?;

        let _ = conn
            .execute(format!("SET SESSION sql_mode = '{}'", self.params.sql_mode).as_str())
            .await;
        if self.params.timezone != "SYSTEM" {
            let _ = conn
                .execute(format!("SET time_zone = '{}'", self.params.timezone).as_str())
                .await;
        }

        if let Ok(row) = conn.fetch_one("SELECT VERSION()").await {
            use sqlx::Row as _;
            if let Ok(version) = row.try_get::<String, usize>(0) {
                self.server_version = parse_version(&version);
            }
        }

        self.conn = Some(conn);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .await
                .map_err(|e| Error::driver_exception("mysql", e))?;
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
        self.conn_mut()?;

        let build_args = || -> Result<AnyArguments<'static>> {
            let mut args = AnyArguments::default();
            for p in params {
                bind_any_value(&mut args, p)?;
            }
            Ok(args)
        };

        let param_strs: Vec<String> = params.iter().map(|v| format!("{v:?}")).collect();

        match self.run_once(sql, build_args()?).await {
            Ok(result) => Ok(result),
            Err(e) if is_lost_connection(&e) => {
                log::warn!("mysql connection lost during execute, reconnecting once");
                self.conn = None;
                self.connect().await?;
                self.run_once(sql, build_args()?)
                    .await
                    .map_err(|e| Error::execute_exception("mysql", e, sql, &param_strs))
            }
            Err(e) => Err(Error::execute_exception("mysql", e, sql, &param_strs)),
        }
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
        let escaped = value
            .replace('\\', "\\\\")
            .replace('\'', "\\'")
            .replace('"', "\\\"")
            .replace('\0', "\\0");
        format!("'{escaped}'")
    }

    fn error_code(&self) -> Option<String> {
        None
    }

    fn error_info(&self) -> Option<String> {
        None
    }

    fn get_server_version_info(&self) -> (u32, u32, u32) {
        self.server_version
    }

    fn get_name(&self) -> &'static str {
        "mysql"
    }

    fn get_placeholder(&self) -> &'static str {
        "?"
    }
}

fn parse_version(version: &str) -> (u32, u32, u32) {
    let core = version.split(|c: char| !c.is_ascii_digit() && c != '.').next().unwrap_or("0.0.0");
    let mut parts = core.split('.').map(|p| p.parse::<u32>().unwrap_or(0));
    (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}
