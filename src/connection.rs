//! Top-level handle: owns one driver, one platform, the schema manager, and
//! the transaction nesting state machine.

use std::collections::HashMap;

use crate::builder::SQLBuilder;
use crate::driver::mysql::{MySqlDriver, MySqlParams};
use crate::driver::sqlite::{SqliteDriver, SqliteParams};
use crate::driver::{Driver, KNOWN_DRIVERS};
use crate::error::{Error, Result};
use crate::expr::ExpressionBuilder;
use crate::platform::mysql::MySqlPlatform;
use crate::platform::sqlite::SqlitePlatform;
use crate::platform::Platform;
use crate::schema::SchemaManager;
use crate::statement::{FetchMode, Params, Projected, Row, Value};

/// The four SQL standard isolation levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// Per-engine connection parameters, picked by [`Connection::connect`]'s
/// `driver_name`.
pub enum DriverParams {
    MySql(MySqlParams),
    Sqlite(SqliteParams),
}

fn build_driver(params: DriverParams) -> (Box<dyn Driver>, Box<dyn Platform>) {
    match params {
        DriverParams::MySql(p) => (Box::new(MySqlDriver::new(p)), Box::new(MySqlPlatform::new())),
        DriverParams::Sqlite(p) => (Box::new(SqliteDriver::new(p)), Box::new(SqlitePlatform::new())),
    }
}

pub struct Connection {
    driver: Box<dyn Driver>,
    platform: Box<dyn Platform>,
    schema_manager: SchemaManager,
    fetch_mode: FetchMode,
    auto_connect: bool,
    auto_commit: bool,
    nesting: u32,
    isolation_level: Option<IsolationLevel>,
    nest_with_savepoints: bool,
    rollback_only: bool,
}

impl Connection {
    /// Opens a new connection for `driver_name` (`"mysql"` or `"sqlite"`).
    pub async fn connect(driver_name: &str, params: DriverParams, auto_commit: bool) -> Result<Self> {
        match (driver_name, &params) {
            ("mysql", DriverParams::MySql(_)) | ("sqlite", DriverParams::Sqlite(_)) => {}
            _ => return Err(Error::unknown_driver(driver_name, KNOWN_DRIVERS)),
        }

        let (mut driver, platform) = build_driver(params);
        driver.connect().await?;

        let mut conn = Connection {
            driver,
            platform,
            schema_manager: SchemaManager::new(),
            fetch_mode: FetchMode::Dict,
            auto_connect: true,
            auto_commit,
            nesting: 0,
            isolation_level: None,
            nest_with_savepoints: false,
            rollback_only: false,
        };
        if !auto_commit {
            conn.begin_transaction().await?;
        }
        Ok(conn)
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    pub fn driver_mut(&mut self) -> &mut dyn Driver {
        self.driver.as_mut()
    }

    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    /// Disjoint borrow of the platform and driver together, for callers
    /// (like [`crate::schema::SchemaManager`]) that need to hand the driver
    /// to a platform introspection method without re-borrowing all of `self`.
    pub fn platform_and_driver_mut(&mut self) -> (&dyn Platform, &mut dyn Driver) {
        (self.platform.as_ref(), self.driver.as_mut())
    }

    /// The schema manager's `bypass_cache` flag and cache can be reached
    /// through here. Its introspection methods all take a `&mut Connection`
    /// themselves (see [`crate::schema::SchemaManager`]), so calling one
    /// through this borrow would re-borrow `self` — use the `Connection`-side
    /// wrappers below (`get_table`, `contains_table`, ...) instead, which do
    /// the temporary-take dance to satisfy the borrow checker.
    pub fn get_schema_manager(&mut self) -> &mut SchemaManager {
        &mut self.schema_manager
    }

    pub async fn get_database_names(&mut self) -> Result<Vec<String>> {
        let mut sm = std::mem::take(&mut self.schema_manager);
        let result = sm.get_database_names(self).await;
        self.schema_manager = sm;
        result
    }

    pub async fn get_views(&mut self, database: Option<&str>) -> Result<Vec<crate::schema::View>> {
        let mut sm = std::mem::take(&mut self.schema_manager);
        let result = sm.get_views(self, database).await;
        self.schema_manager = sm;
        result
    }

    pub async fn get_view_names(&mut self, database: Option<&str>) -> Result<Vec<String>> {
        let mut sm = std::mem::take(&mut self.schema_manager);
        let result = sm.get_view_names(self, database).await;
        self.schema_manager = sm;
        result
    }

    pub async fn get_table_names(&mut self, database: Option<&str>) -> Result<Vec<String>> {
        let mut sm = std::mem::take(&mut self.schema_manager);
        let result = sm.get_table_names(self, database).await;
        self.schema_manager = sm;
        result
    }

    pub async fn get_table_columns(&mut self, table: &str, database: Option<&str>) -> Result<Vec<crate::schema::Column>> {
        let mut sm = std::mem::take(&mut self.schema_manager);
        let result = sm.get_table_columns(self, table, database).await;
        self.schema_manager = sm;
        result
    }

    pub async fn get_table_indexes(&mut self, table: &str, database: Option<&str>) -> Result<Vec<crate::schema::Index>> {
        let mut sm = std::mem::take(&mut self.schema_manager);
        let result = sm.get_table_indexes(self, table, database).await;
        self.schema_manager = sm;
        result
    }

    pub async fn get_table_foreign_keys(
        &mut self,
        table: &str,
        database: Option<&str>,
    ) -> Result<Vec<crate::schema::ForeignKey>> {
        let mut sm = std::mem::take(&mut self.schema_manager);
        let result = sm.get_table_foreign_keys(self, table, database).await;
        self.schema_manager = sm;
        result
    }

    pub async fn get_table(&mut self, table: &str, database: Option<&str>) -> Result<crate::schema::Table> {
        let mut sm = std::mem::take(&mut self.schema_manager);
        let result = sm.get_table(self, table, database).await;
        self.schema_manager = sm;
        result
    }

    pub async fn contains_table(&mut self, item: impl crate::schema::NamedAsset) -> Result<bool> {
        let mut sm = std::mem::take(&mut self.schema_manager);
        let result = sm.contains_table(self, item).await;
        self.schema_manager = sm;
        result
    }

    pub async fn contains_view(&mut self, item: impl crate::schema::NamedAsset) -> Result<bool> {
        let mut sm = std::mem::take(&mut self.schema_manager);
        let result = sm.contains_view(self, item).await;
        self.schema_manager = sm;
        result
    }

    pub fn get_expression_builder(&self) -> ExpressionBuilder {
        ExpressionBuilder
    }

    pub fn sql_builder(&self) -> SQLBuilder {
        SQLBuilder::new()
    }

    pub fn get_fetch_mode(&self) -> FetchMode {
        self.fetch_mode
    }

    pub fn set_fetch_mode(&mut self, mode: FetchMode) {
        self.fetch_mode = mode;
    }

    pub fn is_connected(&self) -> bool {
        self.driver.is_connected()
    }

    pub async fn ensure_connected(&mut self) -> Result<()> {
        if !self.is_connected() {
            if !self.auto_connect {
                return Err(Error::ConnectionClosed);
            }
            self.driver.connect().await?;
        }
        Ok(())
    }

    fn placeholder_rewrite(&self, sql: &str, params: &Params) -> Result<(String, Vec<Value>)> {
        crate::statement::rewrite(sql, params, self.driver.get_placeholder())
    }

    /// Runs a SELECT, returning the buffered result rows.
    pub async fn query(&mut self, sql: &str, params: Params) -> Result<Vec<Row>> {
        self.ensure_connected().await?;
        let (rewritten, bound) = self.placeholder_rewrite(sql, &params)?;
        self.driver.execute(&rewritten, &bound).await?;
        Ok(self.driver.iterate().collect())
    }

    /// Runs a SELECT, returning the first row projected through the
    /// configured fetch mode, or `None` if the result set is empty.
    pub async fn fetch(&mut self, sql: &str, params: Params) -> Result<Option<Projected>> {
        let fetch_mode = self.fetch_mode;
        Ok(self.query(sql, params).await?.into_iter().next().map(|r| r.project(fetch_mode, 0)))
    }

    /// Runs a SELECT, returning every row projected through the configured
    /// fetch mode.
    pub async fn fetch_all(&mut self, sql: &str, params: Params) -> Result<Vec<Projected>> {
        let fetch_mode = self.fetch_mode;
        Ok(self.query(sql, params).await?.into_iter().map(|r| r.project(fetch_mode, 0)).collect())
    }

    /// Runs a SELECT, returning the value at `column_index` of the first
    /// row, or `None` if the result set is empty.
    pub async fn fetch_column(&mut self, sql: &str, params: Params, column_index: usize) -> Result<Option<Value>> {
        let rows = self.query(sql, params).await?;
        Ok(rows.into_iter().next().and_then(|r| r.values.get(column_index).cloned()))
    }

    /// Runs an INSERT/UPDATE/DELETE, returning the number of affected rows.
    pub async fn execute(&mut self, sql: &str, params: Params) -> Result<u64> {
        self.ensure_connected().await?;
        let (rewritten, bound) = self.placeholder_rewrite(sql, &params)?;
        let result = self.driver.execute(&rewritten, &bound).await?;
        Ok(result.rows_affected)
    }

    pub async fn row_count(&mut self) -> Result<u64> {
        self.ensure_connected().await?;
        Ok(self.driver.row_count())
    }

    pub fn last_insert_id(&self) -> i64 {
        self.driver.last_insert_id()
    }

    pub async fn error_code(&mut self) -> Result<Option<String>> {
        self.ensure_connected().await?;
        Ok(self.driver.error_code())
    }

    pub async fn error_info(&mut self) -> Result<Option<String>> {
        self.ensure_connected().await?;
        Ok(self.driver.error_info())
    }

    fn nested_savepoint_name(&self) -> String {
        format!("PYDBAL_SAVEPOINT_{}", self.nesting)
    }

    pub async fn begin_transaction(&mut self) -> Result<()> {
        self.ensure_connected().await?;
        self.nesting += 1;
        if self.nesting == 1 {
            self.driver.begin_transaction().await?;
        } else if self.nest_with_savepoints {
            let name = self.nested_savepoint_name();
            self.create_savepoint(&name).await?;
        }
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<()> {
        if self.nesting == 0 {
            return Err(Error::NoActiveTransaction);
        }
        if self.rollback_only {
            return Err(Error::CommitFailedRollbackOnly);
        }

        self.ensure_connected().await?;
        if self.nesting == 1 {
            self.driver.commit().await?;
        } else if self.nest_with_savepoints {
            let name = self.nested_savepoint_name();
            self.release_savepoint(&name).await?;
        }
        self.nesting -= 1;

        if !self.auto_commit && self.nesting == 0 {
            self.begin_transaction().await?;
        }
        Ok(())
    }

    pub async fn commit_all(&mut self) -> Result<()> {
        while self.nesting != 0 {
            if !self.auto_commit && self.nesting == 1 {
                return self.commit().await;
            }
            self.commit().await?;
        }
        Ok(())
    }

    pub async fn rollback(&mut self) -> Result<()> {
        if self.nesting == 0 {
            return Err(Error::NoActiveTransaction);
        }

        self.ensure_connected().await?;
        if self.nesting == 1 {
            self.nesting = 0;
            self.driver.rollback().await?;
            self.rollback_only = false;
            if !self.auto_commit {
                self.begin_transaction().await?;
            }
        } else if self.nest_with_savepoints {
            let name = self.nested_savepoint_name();
            self.rollback_savepoint(&name).await?;
            self.nesting -= 1;
        } else {
            self.rollback_only = true;
            self.nesting -= 1;
        }
        Ok(())
    }

    /// Runs `body` inside a transaction, rolling back and propagating the
    /// error on failure, committing on success.
    pub async fn transaction<F, Fut, T>(&mut self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        self.begin_transaction().await?;
        match body(self).await {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                self.rollback().await?;
                Err(err)
            }
        }
    }

    pub fn is_auto_commit(&self) -> bool {
        self.auto_commit
    }

    pub async fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        if auto_commit == self.auto_commit {
            return Ok(());
        }
        self.auto_commit = auto_commit;
        if self.is_connected() && self.nesting != 0 {
            self.commit_all().await?;
        }
        Ok(())
    }

    pub fn is_transaction_active(&self) -> bool {
        self.nesting > 0
    }

    pub fn set_rollback_only(&mut self) -> Result<()> {
        if self.nesting == 0 {
            return Err(Error::NoActiveTransaction);
        }
        self.rollback_only = true;
        Ok(())
    }

    pub fn is_rollback_only(&self) -> Result<bool> {
        if self.nesting == 0 {
            return Err(Error::NoActiveTransaction);
        }
        Ok(self.rollback_only)
    }

    pub async fn set_transaction_isolation(&mut self, level: IsolationLevel) -> Result<()> {
        self.ensure_connected().await?;
        self.isolation_level = Some(level);
        self.platform.set_transaction_isolation(self.driver.as_mut(), level).await
    }

    pub fn get_transaction_isolation(&mut self) -> IsolationLevel {
        *self
            .isolation_level
            .get_or_insert_with(|| self.platform.default_transaction_isolation_level())
    }

    pub fn set_nest_transactions_with_savepoints(&mut self, nest: bool) -> Result<()> {
        if self.nesting > 0 {
            return Err(Error::MayNotAlterNestWithSavepointsInTransaction);
        }
        if !self.platform.is_savepoints_supported() {
            return Err(Error::SavepointsNotSupported);
        }
        self.nest_with_savepoints = nest;
        Ok(())
    }

    pub fn get_nest_transactions_with_savepoints(&self) -> bool {
        self.nest_with_savepoints
    }

    pub async fn create_savepoint(&mut self, savepoint: &str) -> Result<()> {
        if !self.platform.is_savepoints_supported() {
            return Err(Error::SavepointsNotSupported);
        }
        self.ensure_connected().await?;
        self.platform.create_savepoint(self.driver.as_mut(), savepoint).await
    }

    pub async fn release_savepoint(&mut self, savepoint: &str) -> Result<()> {
        if !self.platform.is_savepoints_supported() {
            return Err(Error::SavepointsNotSupported);
        }
        if self.platform.is_release_savepoints_supported() {
            self.ensure_connected().await?;
            self.platform.release_savepoint(self.driver.as_mut(), savepoint).await?;
        }
        Ok(())
    }

    pub async fn rollback_savepoint(&mut self, savepoint: &str) -> Result<()> {
        if !self.platform.is_savepoints_supported() {
            return Err(Error::SavepointsNotSupported);
        }
        self.ensure_connected().await?;
        self.platform.rollback_savepoint(self.driver.as_mut(), savepoint).await
    }

    pub async fn insert(&mut self, table: &str, values: HashMap<String, Value>) -> Result<i64> {
        let mut sb = self.sql_builder();
        sb.insert(table);
        for (column, value) in values {
            let placeholder = sb.create_positional_parameter(value);
            sb.set_value(&column, &placeholder);
        }
        match sb.execute(self).await? {
            crate::builder::ExecuteOutcome::LastInsertId(id) => Ok(id),
            _ => unreachable!("insert builder always yields LastInsertId"),
        }
    }

    pub async fn update(
        &mut self,
        table: &str,
        values: HashMap<String, Value>,
        identifier: HashMap<String, Value>,
    ) -> Result<u64> {
        let mut sb = self.sql_builder();
        sb.update(table, None);
        for (column, value) in values {
            let placeholder = sb.create_positional_parameter(value);
            sb.set(&column, &placeholder);
        }
        for (column, value) in identifier {
            let placeholder = sb.create_positional_parameter(value);
            sb.and_where(format!("{column} = {placeholder}"));
        }
        match sb.execute(self).await? {
            crate::builder::ExecuteOutcome::RowsAffected(n) => Ok(n),
            _ => unreachable!("update builder always yields RowsAffected"),
        }
    }

    pub async fn delete(&mut self, table: &str, identifier: HashMap<String, Value>) -> Result<u64> {
        let mut sb = self.sql_builder();
        sb.delete(table, None);
        for (column, value) in identifier {
            let placeholder = sb.create_positional_parameter(value);
            sb.and_where(format!("{column} = {placeholder}"));
        }
        match sb.execute(self).await? {
            crate::builder::ExecuteOutcome::RowsAffected(n) => Ok(n),
            _ => unreachable!("delete builder always yields RowsAffected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::sqlite::SqliteParams;

    async fn memory_connection() -> Connection {
        Connection::connect("sqlite", DriverParams::Sqlite(SqliteParams::default()), true)
            .await
            .expect("in-memory sqlite connects")
    }

    #[tokio::test]
    async fn unknown_driver_name_errors() {
        match Connection::connect("postgres", DriverParams::Sqlite(SqliteParams::default()), true).await {
            Err(Error::UnknownDriver(..)) => {}
            Err(other) => panic!("expected UnknownDriver, got {other:?}"),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[tokio::test]
    async fn nested_savepoint_name_matches_documented_convention() {
        let mut conn = memory_connection().await;
        conn.nesting = 2;
        assert_eq!(conn.nested_savepoint_name(), "PYDBAL_SAVEPOINT_2");
    }

    #[tokio::test]
    async fn commit_without_transaction_errors() {
        let mut conn = memory_connection().await;
        let err = conn.commit().await.unwrap_err();
        assert!(matches!(err, Error::NoActiveTransaction));
    }

    #[tokio::test]
    async fn fetch_honors_configured_fetch_mode() {
        let mut conn = memory_connection().await;
        conn.execute("CREATE TABLE t (a INTEGER, b TEXT)", Params::new()).await.unwrap();
        conn.execute("INSERT INTO t VALUES (1, 'x')", Params::new()).await.unwrap();

        conn.set_fetch_mode(FetchMode::Column);
        match conn.fetch("SELECT a, b FROM t", Params::new()).await.unwrap() {
            Some(Projected::Column(Some(Value::Int(1)))) => {}
            other => panic!("unexpected {other:?}"),
        }

        conn.set_fetch_mode(FetchMode::Tuple);
        match conn.fetch("SELECT a, b FROM t", Params::new()).await.unwrap() {
            Some(Projected::Tuple(values)) => assert_eq!(values.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_returns_none_on_empty_result() {
        let mut conn = memory_connection().await;
        conn.execute("CREATE TABLE t (a INTEGER)", Params::new()).await.unwrap();
        assert!(conn.fetch("SELECT a FROM t", Params::new()).await.unwrap().is_none());
        assert!(conn.fetch_column("SELECT a FROM t", Params::new(), 0).await.unwrap().is_none());
    }
}
