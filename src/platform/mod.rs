//! Per-engine dialect rules: LIMIT/OFFSET encoding, isolation-level SQL,
//! identifier quoting, keyword reservation, and introspection.

pub mod mysql;
pub mod sqlite;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::connection::IsolationLevel;
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::types::BaseType;

/// Normalized column metadata yielded by introspection, before it is wrapped
/// into a [`crate::schema::Column`] asset.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub ty: BaseType,
    pub length: Option<u64>,
    pub notnull: bool,
    pub default: Option<String>,
    pub autoincrement: bool,
    pub unsigned: bool,
    pub comment: Option<String>,
}

/// Normalized index metadata.
#[derive(Debug, Clone)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub primary: bool,
}

/// Normalized foreign-key metadata.
#[derive(Debug, Clone)]
pub struct ForeignKeyInfo {
    pub name: String,
    pub local_columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
}

static RE_TABLE_COLUMN_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<type>\w*)\s*(?:\(\s*(?P<length>\d+(?:,\d+)?)\s*\))?").unwrap());

static RE_COMMENT_TYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\(DBALType:(?P<type>\w+)\)\s*").unwrap());

/// Splits a native column type string (e.g. `varchar(255)`) into its bare
/// type name and optional length/precision spec.
pub fn split_table_column_type(native_type: &str) -> (String, Option<String>) {
    match RE_TABLE_COLUMN_TYPE.captures(native_type) {
        Some(caps) => (
            caps.name("type").map(|m| m.as_str().to_string()).unwrap_or_default(),
            caps.name("length").map(|m| m.as_str().to_string()),
        ),
        None => (native_type.to_string(), None),
    }
}

/// Strips a `(DBALType:X)` override out of a column comment, returning the
/// cleaned comment and the override type name if present.
pub fn type_from_comment(comment: &str) -> (String, Option<String>) {
    let mut override_type = None;
    let cleaned = RE_COMMENT_TYPE
        .replace(comment, |caps: &regex::Captures| {
            override_type = Some(caps["type"].to_string());
            ""
        })
        .to_string();
    (cleaned, override_type)
}

/// Per-engine dialect contract. One implementation per entry in
/// [`crate::driver::KNOWN_DRIVERS`].
#[async_trait]
pub trait Platform: Send + Sync {
    fn name(&self) -> &'static str;

    /// The character used to quote identifiers (`` ` `` for MySQL, `"` generically).
    fn identifier_quote_character(&self) -> char;

    fn reserved_keywords(&self) -> &'static [&'static str];

    fn is_keyword(&self, word: &str) -> bool {
        let upper = word.to_ascii_uppercase();
        self.reserved_keywords().iter().any(|k| *k == upper)
    }

    fn quote_single_identifier(&self, identifier: &str) -> String {
        let c = self.identifier_quote_character();
        let doubled: String = identifier.chars().flat_map(|ch| {
            if ch == c {
                vec![ch, ch]
            } else {
                vec![ch]
            }
        }).collect();
        format!("{c}{doubled}{c}")
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        identifier
            .split('.')
            .map(|part| self.quote_single_identifier(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn is_limit_offset_supported(&self) -> bool {
        true
    }

    /// Applies LIMIT/OFFSET to `sql` per this engine's encoding.
    fn modify_limit_sql(&self, sql: &str, limit: Option<i64>, offset: Option<i64>) -> Result<String> {
        if let Some(o) = offset {
            if o < 0 {
                return Err(Error::InvalidOffset(o));
            }
            if o > 0 && !self.is_limit_offset_supported() {
                return Err(Error::offset_not_supported(self.name_static()));
            }
        }
        Ok(self.modify_limit_sql_impl(sql, limit, offset))
    }

    /// Leaf name used in error messages; distinct from `name()` only because
    /// it must be `'static` for the error's lifetime-free variant.
    fn name_static(&self) -> &'static str;

    fn modify_limit_sql_impl(&self, sql: &str, limit: Option<i64>, offset: Option<i64>) -> String {
        let mut sql = sql.to_string();
        if let Some(l) = limit {
            sql.push_str(&format!(" LIMIT {l}"));
        }
        if let Some(o) = offset {
            sql.push_str(&format!(" OFFSET {o}"));
        }
        sql
    }

    fn is_savepoints_supported(&self) -> bool {
        true
    }

    fn is_release_savepoints_supported(&self) -> bool {
        self.is_savepoints_supported()
    }

    async fn create_savepoint(&self, driver: &mut dyn Driver, savepoint: &str) -> Result<()> {
        if !self.is_savepoints_supported() {
            return Err(Error::SavepointsNotSupported);
        }
        driver.execute_and_clear(&format!("SAVEPOINT {savepoint}")).await
    }

    async fn release_savepoint(&self, driver: &mut dyn Driver, savepoint: &str) -> Result<()> {
        if !self.is_savepoints_supported() {
            return Err(Error::SavepointsNotSupported);
        }
        if self.is_release_savepoints_supported() {
            driver.execute_and_clear(&format!("RELEASE SAVEPOINT {savepoint}")).await?;
        }
        Ok(())
    }

    async fn rollback_savepoint(&self, driver: &mut dyn Driver, savepoint: &str) -> Result<()> {
        if !self.is_savepoints_supported() {
            return Err(Error::SavepointsNotSupported);
        }
        driver.execute_and_clear(&format!("ROLLBACK TO SAVEPOINT {savepoint}")).await
    }

    fn default_transaction_isolation_level(&self) -> IsolationLevel {
        IsolationLevel::ReadCommitted
    }

    /// Renders and runs the SQL that sets the session's isolation level.
    async fn set_transaction_isolation(&self, driver: &mut dyn Driver, level: IsolationLevel) -> Result<()>;

    fn type_mapping(&self, native_type: &str) -> Result<BaseType>;

    async fn get_database_names(&self, driver: &mut dyn Driver) -> Result<Vec<String>>;

    async fn get_views(&self, driver: &mut dyn Driver, database: Option<&str>) -> Result<Vec<(String, String)>>;

    async fn get_tables(&self, driver: &mut dyn Driver, database: Option<&str>) -> Result<Vec<String>>;

    async fn get_table_columns(
        &self,
        driver: &mut dyn Driver,
        table: &str,
        database: Option<&str>,
    ) -> Result<Vec<ColumnInfo>>;

    async fn get_table_indexes(
        &self,
        driver: &mut dyn Driver,
        table: &str,
        database: Option<&str>,
    ) -> Result<Vec<IndexInfo>>;

    async fn get_table_foreign_keys(
        &self,
        driver: &mut dyn Driver,
        table: &str,
        database: Option<&str>,
    ) -> Result<Vec<ForeignKeyInfo>>;
}

/// Runs `sql` against `driver` and returns the buffered rows.
pub(crate) async fn fetch(driver: &mut dyn Driver, sql: &str) -> Result<Vec<crate::statement::Row>> {
    driver.execute(sql, &[]).await?;
    Ok(driver.iterate().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_native_type_and_length() {
        assert_eq!(
            split_table_column_type("varchar(255)"),
            ("varchar".to_string(), Some("255".to_string()))
        );
        assert_eq!(split_table_column_type("int"), ("int".to_string(), None));
    }

    #[test]
    fn extracts_dbal_type_override_from_comment() {
        let (comment, ty) = type_from_comment("a note (DBALType:guid)");
        assert_eq!(ty.as_deref(), Some("guid"));
        assert_eq!(comment.trim(), "a note");
    }
}
