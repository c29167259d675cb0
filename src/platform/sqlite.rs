//! SQLite dialect rules: double-quote identifiers, `sqlite_master`/`PRAGMA`
//! introspection, offset-only paging via `LIMIT -1`.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{ColumnInfo, ForeignKeyInfo, IndexInfo, Platform};
use crate::connection::IsolationLevel;
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::types::BaseType;

const KEYWORDS: &[&str] = &[
    "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ANALYZE", "AND", "AS", "ASC", "ATTACH",
    "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BY", "CASCADE", "CASE", "CAST", "CHECK",
    "COLLATE", "COLUMN", "COMMIT", "CONFLICT", "CONSTRAINT", "CREATE", "CROSS", "CURRENT_DATE",
    "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT", "DEFERRABLE", "DEFERRED",
    "DELETE", "DESC", "DETACH", "DISTINCT", "DROP", "EACH", "ELSE", "END", "ESCAPE", "EXCEPT",
    "EXCLUSIVE", "EXISTS", "EXPLAIN", "FAIL", "FOR", "FOREIGN", "FROM", "FULL", "GLOB", "GROUP",
    "HAVING", "IF", "IGNORE", "IMMEDIATE", "IN", "INDEX", "INDEXED", "INITIALLY", "INNER",
    "INSERT", "INSTEAD", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN", "KEY", "LEFT", "LIKE",
    "LIMIT", "MATCH", "NATURAL", "NO", "NOT", "NOTNULL", "NULL", "OF", "OFFSET", "ON", "OR",
    "ORDER", "OUTER", "PLAN", "PRAGMA", "PRIMARY", "QUERY", "RAISE", "RECURSIVE", "REFERENCES",
    "REGEXP", "REINDEX", "RELEASE", "RENAME", "REPLACE", "RESTRICT", "RIGHT", "ROLLBACK", "ROW",
    "SAVEPOINT", "SELECT", "SET", "TABLE", "TEMP", "TEMPORARY", "THEN", "TO", "TRANSACTION",
    "TRIGGER", "UNION", "UNIQUE", "UPDATE", "USING", "VACUUM", "VALUES", "VIEW", "VIRTUAL",
    "WHEN", "WHERE", "WITH", "WITHOUT",
];

static RE_COLUMN_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)"?(?P<name>\w+)"?\s+(?P<type>\w+(?:\(\d+(?:,\s*\d+)?\))?)"#).unwrap()
});

pub struct SqlitePlatform;

impl SqlitePlatform {
    pub fn new() -> Self {
        SqlitePlatform
    }
}

impl Default for SqlitePlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Platform for SqlitePlatform {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn name_static(&self) -> &'static str {
        "sqlite"
    }

    fn identifier_quote_character(&self) -> char {
        '"'
    }

    fn reserved_keywords(&self) -> &'static [&'static str] {
        KEYWORDS
    }

    fn modify_limit_sql_impl(&self, sql: &str, limit: Option<i64>, offset: Option<i64>) -> String {
        match (limit, offset) {
            (Some(l), Some(o)) if o > 0 => format!("{sql} LIMIT {l} OFFSET {o}"),
            (Some(l), _) => format!("{sql} LIMIT {l}"),
            (None, Some(o)) if o > 0 => format!("{sql} LIMIT -1 OFFSET {o}"),
            (None, _) => sql.to_string(),
        }
    }

    fn is_release_savepoints_supported(&self) -> bool {
        true
    }

    async fn set_transaction_isolation(&self, driver: &mut dyn Driver, level: IsolationLevel) -> Result<()> {
        let read_uncommitted = match level {
            IsolationLevel::ReadUncommitted => 1,
            IsolationLevel::ReadCommitted | IsolationLevel::RepeatableRead | IsolationLevel::Serializable => 0,
        };
        driver
            .execute_and_clear(&format!("PRAGMA read_uncommitted = {read_uncommitted}"))
            .await
    }

    fn default_transaction_isolation_level(&self) -> IsolationLevel {
        IsolationLevel::Serializable
    }

    fn type_mapping(&self, native_type: &str) -> Result<BaseType> {
        let lower = native_type.to_ascii_lowercase();
        Ok(match lower.as_str() {
            "" => BaseType::Text,
            "boolean" => BaseType::Boolean,
            "smallint" => BaseType::SmallInt,
            "int" | "integer" | "mediumint" => BaseType::Integer,
            "bigint" => BaseType::BigInt,
            "decimal" | "numeric" => BaseType::Decimal,
            "float" | "double" | "real" => BaseType::Float,
            "char" | "varchar" | "nvarchar" => BaseType::String,
            "text" | "clob" => BaseType::Text,
            "binary" | "varbinary" => BaseType::Binary,
            "blob" => BaseType::Blob,
            "date" => BaseType::Date,
            "time" => BaseType::Time,
            "datetime" | "timestamp" => BaseType::DateTime,
            other => return Err(Error::unknown_column_type(other)),
        })
    }

    async fn get_database_names(&self, driver: &mut dyn Driver) -> Result<Vec<String>> {
        let rows = super::fetch(driver, "PRAGMA database_list").await?;
        Ok(rows.into_iter().filter_map(|r| r.get("name").and_then(|v| v.as_text())).collect())
    }

    async fn get_views(&self, driver: &mut dyn Driver, _database: Option<&str>) -> Result<Vec<(String, String)>> {
        let rows = super::fetch(
            driver,
            "SELECT name, sql FROM sqlite_master WHERE type = 'view'",
        )
        .await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| Some((r.get("name")?.as_text()?, r.get("sql")?.as_text().unwrap_or_default())))
            .collect())
    }

    async fn get_tables(&self, driver: &mut dyn Driver, _database: Option<&str>) -> Result<Vec<String>> {
        let rows = super::fetch(
            driver,
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )
        .await?;
        Ok(rows.into_iter().filter_map(|r| r.get("name").and_then(|v| v.as_text())).collect())
    }

    async fn get_table_columns(
        &self,
        driver: &mut dyn Driver,
        table: &str,
        _database: Option<&str>,
    ) -> Result<Vec<ColumnInfo>> {
        let create_sql_rows = super::fetch(
            driver,
            &format!("SELECT sql FROM sqlite_master WHERE type = 'table' AND name = '{table}'"),
        )
        .await?;
        let create_sql = create_sql_rows
            .first()
            .and_then(|r| r.get("sql"))
            .and_then(|v| v.as_text())
            .unwrap_or_default();

        let rows = super::fetch(driver, &format!("PRAGMA table_info(\"{table}\")")).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let name = row.get("name").and_then(|v| v.as_text()).unwrap_or_default();
            let native_type = row.get("type").and_then(|v| v.as_text()).unwrap_or_default();
            let (base_type_name, length) = super::split_table_column_type(&native_type);

            let raw_comment = extract_column_comment(&create_sql, &name);
            let (comment, override_type) = match raw_comment {
                Some(c) => super::type_from_comment(&c),
                None => (String::new(), None),
            };

            let ty = match override_type {
                Some(name) => BaseType::from_name(&name)?,
                None => self.type_mapping(&base_type_name)?,
            };

            let is_pk = row.get("pk").and_then(|v| v.as_int()).unwrap_or(0) != 0;

            out.push(ColumnInfo {
                name,
                ty,
                length: length.and_then(|l| l.split(',').next().and_then(|n| n.parse().ok())),
                notnull: row.get("notnull").and_then(|v| v.as_int()).unwrap_or(0) != 0,
                default: row.get("dflt_value").and_then(|v| v.as_text()),
                // SQLite aliases the rowid onto any lone INTEGER PRIMARY KEY column,
                // so a bare PK already behaves like autoincrement for this layer.
                autoincrement: is_pk && base_type_name.eq_ignore_ascii_case("integer"),
                unsigned: false,
                comment: if comment.trim().is_empty() { None } else { Some(comment.trim().to_string()) },
            });
        }
        Ok(out)
    }

    async fn get_table_indexes(
        &self,
        driver: &mut dyn Driver,
        table: &str,
        _database: Option<&str>,
    ) -> Result<Vec<IndexInfo>> {
        let mut indexes = Vec::new();

        let pk_cols: Vec<String> = super::fetch(driver, &format!("PRAGMA table_info(\"{table}\")"))
            .await?
            .into_iter()
            .filter(|r| r.get("pk").and_then(|v| v.as_int()).unwrap_or(0) != 0)
            .filter_map(|r| r.get("name").and_then(|v| v.as_text()))
            .collect();
        if !pk_cols.is_empty() {
            indexes.push(IndexInfo {
                name: "PRIMARY".to_string(),
                columns: pk_cols,
                unique: true,
                primary: true,
            });
        }

        let index_list = super::fetch(driver, &format!("PRAGMA index_list(\"{table}\")")).await?;
        for idx_row in index_list {
            let name = idx_row.get("name").and_then(|v| v.as_text()).unwrap_or_default();
            let unique = idx_row.get("unique").and_then(|v| v.as_int()).unwrap_or(0) != 0;
            let columns: Vec<String> = super::fetch(driver, &format!("PRAGMA index_info(\"{name}\")"))
                .await?
                .into_iter()
                .filter_map(|r| r.get("name").and_then(|v| v.as_text()))
                .collect();
            indexes.push(IndexInfo { name, columns, unique, primary: false });
        }
        Ok(indexes)
    }

    async fn get_table_foreign_keys(
        &self,
        driver: &mut dyn Driver,
        table: &str,
        _database: Option<&str>,
    ) -> Result<Vec<ForeignKeyInfo>> {
        let rows = super::fetch(driver, &format!("PRAGMA foreign_key_list(\"{table}\")")).await?;
        let mut fks: Vec<ForeignKeyInfo> = Vec::new();
        for row in rows {
            let id = row.get("id").and_then(|v| v.as_int()).unwrap_or(0);
            let name = format!("fk_{table}_{id}");
            let local_column = row.get("from").and_then(|v| v.as_text()).unwrap_or_default();
            let ref_table = row.get("table").and_then(|v| v.as_text()).unwrap_or_default();
            let ref_column = row.get("to").and_then(|v| v.as_text()).unwrap_or_default();
            let on_delete = row.get("on_delete").and_then(|v| v.as_text());
            let on_update = row.get("on_update").and_then(|v| v.as_text());

            if let Some(existing) = fks.iter_mut().find(|f| f.name == name) {
                existing.local_columns.push(local_column);
                existing.referenced_columns.push(ref_column);
            } else {
                fks.push(ForeignKeyInfo {
                    name,
                    local_columns: vec![local_column],
                    referenced_table: ref_table,
                    referenced_columns: vec![ref_column],
                    on_delete,
                    on_update,
                });
            }
        }
        Ok(fks)
    }
}

/// Pulls a trailing `-- comment` off a column's definition line inside a
/// `CREATE TABLE` statement, since SQLite has no native column comment store.
fn extract_column_comment(create_sql: &str, column: &str) -> Option<String> {
    for line in create_sql.lines() {
        if let Some(caps) = RE_COLUMN_DEF.captures(line.trim_start())
            && caps.name("name").map(|m| m.as_str()) == Some(column)
                && let Some(idx) = line.find("--") {
                    return Some(line[idx + 2..].trim().to_string());
                }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_trailing_comment_for_named_column() {
        let sql = "CREATE TABLE t (\n  id INTEGER PRIMARY KEY,\n  note TEXT -- (DBALType:guid)\n)";
        let comment = extract_column_comment(sql, "note").unwrap();
        assert!(comment.contains("DBALType:guid"));
    }
}
