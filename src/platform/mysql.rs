//! MySQL dialect rules: backtick identifiers, `INFORMATION_SCHEMA`
//! introspection, offset-only paging via the `u64::MAX` sentinel.

use async_trait::async_trait;

use super::{ColumnInfo, ForeignKeyInfo, IndexInfo, Platform};
use crate::connection::IsolationLevel;
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::types::BaseType;

const KEYWORDS: &[&str] = &[
    "ACCESSIBLE", "ADD", "ALL", "ALTER", "ANALYZE", "AND", "AS", "ASC", "ASENSITIVE", "BEFORE",
    "BETWEEN", "BIGINT", "BINARY", "BLOB", "BOTH", "BY", "CALL", "CASCADE", "CASE", "CHANGE",
    "CHAR", "CHARACTER", "CHECK", "COLLATE", "COLUMN", "CONDITION", "CONSTRAINT", "CONTINUE",
    "CONVERT", "CREATE", "CROSS", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP",
    "CURRENT_USER", "CURSOR", "DATABASE", "DATABASES", "DAY_HOUR", "DAY_MICROSECOND",
    "DAY_MINUTE", "DAY_SECOND", "DEC", "DECIMAL", "DECLARE", "DEFAULT", "DELAYED", "DELETE",
    "DESC", "DESCRIBE", "DETERMINISTIC", "DISTINCT", "DISTINCTROW", "DIV", "DOUBLE", "DROP",
    "DUAL", "EACH", "ELSE", "ELSEIF", "ENCLOSED", "ESCAPED", "EXISTS", "EXIT", "EXPLAIN", "FALSE",
    "FETCH", "FLOAT", "FLOAT4", "FLOAT8", "FOR", "FORCE", "FOREIGN", "FROM", "FULLTEXT",
    "GENERATED", "GET", "GRANT", "GROUP", "HAVING", "HIGH_PRIORITY", "HOUR_MICROSECOND",
    "HOUR_MINUTE", "HOUR_SECOND", "IF", "IGNORE", "IN", "INDEX", "INFILE", "INNER", "INOUT",
    "INSENSITIVE", "INSERT", "INT", "INT1", "INT2", "INT3", "INT4", "INT8", "INTEGER", "INTERVAL",
    "INTO", "IO_AFTER_GTIDS", "IO_BEFORE_GTIDS", "IS", "ITERATE", "JOIN", "KEY", "KEYS", "KILL",
    "LEADING", "LEAVE", "LEFT", "LIKE", "LIMIT", "LINEAR", "LINES", "LOAD", "LOCALTIME",
    "LOCALTIMESTAMP", "LOCK", "LONG", "LONGBLOB", "LONGTEXT", "LOOP", "LOW_PRIORITY",
    "MASTER_BIND", "MATCH", "MAXVALUE", "MEDIUMBLOB", "MEDIUMINT", "MEDIUMTEXT", "MIDDLEINT",
    "MINUTE_MICROSECOND", "MINUTE_SECOND", "MOD", "MODIFIES", "NATURAL", "NOT", "NO_WRITE_TO_BINLOG",
    "NULL", "NUMERIC", "ON", "OPTIMIZE", "OPTIMIZER_COSTS", "OPTION", "OPTIONALLY", "OR", "ORDER",
    "OUT", "OUTER", "OUTFILE", "PARTITION", "PRECISION", "PRIMARY", "PROCEDURE", "PURGE", "RANGE",
    "READ", "READS", "READ_WRITE", "REAL", "REFERENCES", "REGEXP", "RELEASE", "RENAME", "REPEAT",
    "REPLACE", "REQUIRE", "RESIGNAL", "RESTRICT", "RETURN", "REVOKE", "RIGHT", "RLIKE", "SCHEMA",
    "SCHEMAS", "SECOND_MICROSECOND", "SELECT", "SENSITIVE", "SEPARATOR", "SET", "SHOW", "SIGNAL",
    "SMALLINT", "SPATIAL", "SPECIFIC", "SQL", "SQLEXCEPTION", "SQLSTATE", "SQLWARNING",
    "SQL_BIG_RESULT", "SQL_CALC_FOUND_ROWS", "SQL_SMALL_RESULT", "SSL", "STARTING",
    "STRAIGHT_JOIN", "TABLE", "TERMINATED", "THEN", "TINYBLOB", "TINYINT", "TINYTEXT", "TO",
    "TRAILING", "TRIGGER", "TRUE", "UNDO", "UNION", "UNIQUE", "UNLOCK", "UNSIGNED", "UPDATE",
    "USAGE", "USE", "USING", "UTC_DATE", "UTC_TIME", "UTC_TIMESTAMP", "VALUES", "VARBINARY",
    "VARCHAR", "VARCHARACTER", "VARYING", "WHEN", "WHERE", "WHILE", "WITH", "WRITE", "XOR",
    "YEAR_MONTH", "ZEROFILL",
];

pub struct MySqlPlatform;

impl MySqlPlatform {
    pub fn new() -> Self {
        MySqlPlatform
    }
}

impl Default for MySqlPlatform {
    fn default() -> Self {
        Self::new()
    }
}

fn isolation_sql(level: IsolationLevel) -> &'static str {
    match level {
        IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
        IsolationLevel::ReadCommitted => "READ COMMITTED",
        IsolationLevel::RepeatableRead => "REPEATABLE READ",
        IsolationLevel::Serializable => "SERIALIZABLE",
    }
}

#[async_trait]
impl Platform for MySqlPlatform {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn name_static(&self) -> &'static str {
        "mysql"
    }

    fn identifier_quote_character(&self) -> char {
        '`'
    }

    fn reserved_keywords(&self) -> &'static [&'static str] {
        KEYWORDS
    }

    fn modify_limit_sql_impl(&self, sql: &str, limit: Option<i64>, offset: Option<i64>) -> String {
        // MySQL requires a LIMIT clause whenever OFFSET is used without one;
        // u64::MAX is the platform's own "no real limit" sentinel.
        let limit_str = match limit {
            Some(l) => l.to_string(),
            None => match offset {
                Some(o) if o > 0 => u64::MAX.to_string(),
                _ => return sql.to_string(),
            },
        };
        let mut out = format!("{sql} LIMIT {limit_str}");
        if let Some(o) = offset
            && o > 0 {
                out.push_str(&format!(" OFFSET {o}"));
            }
        out
    }

    async fn set_transaction_isolation(&self, driver: &mut dyn Driver, level: IsolationLevel) -> Result<()> {
        driver
            .execute_and_clear(&format!(
                "SET SESSION TRANSACTION ISOLATION LEVEL {}",
                isolation_sql(level)
            ))
            .await
    }

    fn type_mapping(&self, native_type: &str) -> Result<BaseType> {
        let lower = native_type.to_ascii_lowercase();
        Ok(match lower.as_str() {
            "tinyint" | "smallint" => BaseType::SmallInt,
            "mediumint" | "int" | "integer" | "year" => BaseType::Integer,
            "bigint" => BaseType::BigInt,
            "decimal" | "numeric" => BaseType::Decimal,
            "float" | "double" | "real" => BaseType::Float,
            "tinytext" | "mediumtext" | "longtext" | "text" => BaseType::Text,
            "char" | "varchar" | "enum" | "set" => BaseType::String,
            "binary" | "varbinary" => BaseType::Binary,
            "tinyblob" | "mediumblob" | "longblob" | "blob" => BaseType::Blob,
            "date" => BaseType::Date,
            "time" => BaseType::Time,
            "datetime" | "timestamp" => BaseType::DateTime,
            "json" => BaseType::Array,
            "bit" | "bool" | "boolean" => BaseType::Boolean,
            other => return Err(Error::unknown_column_type(other)),
        })
    }

    async fn get_database_names(&self, driver: &mut dyn Driver) -> Result<Vec<String>> {
        let rows = super::fetch(driver, "SELECT SCHEMA_NAME AS name FROM INFORMATION_SCHEMA.SCHEMATA").await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| r.get("name").and_then(|v| v.as_text()))
            .collect())
    }

    async fn get_views(&self, driver: &mut dyn Driver, database: Option<&str>) -> Result<Vec<(String, String)>> {
        let db = database.map(|d| format!("'{d}'")).unwrap_or_else(|| "DATABASE()".to_string());
        let sql = format!(
            "SELECT TABLE_NAME AS name, VIEW_DEFINITION AS sql \
             FROM INFORMATION_SCHEMA.VIEWS WHERE TABLE_SCHEMA = {db}"
        );
        let rows = super::fetch(driver, &sql).await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| Some((r.get("name")?.as_text()?, r.get("sql")?.as_text().unwrap_or_default())))
            .collect())
    }

    async fn get_tables(&self, driver: &mut dyn Driver, database: Option<&str>) -> Result<Vec<String>> {
        let db = database.map(|d| format!("'{d}'")).unwrap_or_else(|| "DATABASE()".to_string());
        let sql = format!(
            "SELECT TABLE_NAME AS name FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_SCHEMA = {db} AND TABLE_TYPE = 'BASE TABLE'"
        );
        let rows = super::fetch(driver, &sql).await?;
        Ok(rows.into_iter().filter_map(|r| r.get("name").and_then(|v| v.as_text())).collect())
    }

    async fn get_table_columns(
        &self,
        driver: &mut dyn Driver,
        table: &str,
        database: Option<&str>,
    ) -> Result<Vec<ColumnInfo>> {
        let db = database.map(|d| format!("'{d}'")).unwrap_or_else(|| "DATABASE()".to_string());
        let sql = format!(
            "SELECT COLUMN_NAME AS name, COLUMN_TYPE AS column_type, DATA_TYPE AS data_type, \
             IS_NULLABLE AS is_nullable, COLUMN_DEFAULT AS col_default, EXTRA AS extra, \
             COLUMN_COMMENT AS comment, CHARACTER_MAXIMUM_LENGTH AS char_len, \
             NUMERIC_PRECISION AS num_precision \
             FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_SCHEMA = {db} AND TABLE_NAME = '{table}' ORDER BY ORDINAL_POSITION"
        );
        let rows = super::fetch(driver, &sql).await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let name = row.get("name").and_then(|v| v.as_text()).unwrap_or_default();
            let column_type = row.get("column_type").and_then(|v| v.as_text()).unwrap_or_default();
            let data_type = row.get("data_type").and_then(|v| v.as_text()).unwrap_or_default();
            let (_, _) = super::split_table_column_type(&column_type);
            let raw_comment = row.get("comment").and_then(|v| v.as_text()).unwrap_or_default();
            let (comment, override_type) = super::type_from_comment(&raw_comment);

            let ty = match override_type {
                Some(name) => BaseType::from_name(&name)?,
                None => self.type_mapping(&data_type)?,
            };

            out.push(ColumnInfo {
                name,
                ty,
                length: row
                    .get("char_len")
                    .and_then(|v| v.as_int())
                    .or_else(|| row.get("num_precision").and_then(|v| v.as_int()))
                    .map(|n| n as u64),
                notnull: row.get("is_nullable").and_then(|v| v.as_text()).as_deref() == Some("NO"),
                default: row.get("col_default").and_then(|v| v.as_text()),
                autoincrement: row
                    .get("extra")
                    .and_then(|v| v.as_text())
                    .map(|e| e.contains("auto_increment"))
                    .unwrap_or(false),
                unsigned: column_type.contains("unsigned"),
                comment: if comment.is_empty() { None } else { Some(comment) },
            });
        }
        Ok(out)
    }

    async fn get_table_indexes(
        &self,
        driver: &mut dyn Driver,
        table: &str,
        database: Option<&str>,
    ) -> Result<Vec<IndexInfo>> {
        let db = database.map(|d| format!("'{d}'")).unwrap_or_else(|| "DATABASE()".to_string());
        let sql = format!(
            "SELECT INDEX_NAME AS name, COLUMN_NAME AS column_name, NON_UNIQUE AS non_unique \
             FROM INFORMATION_SCHEMA.STATISTICS \
             WHERE TABLE_SCHEMA = {db} AND TABLE_NAME = '{table}' ORDER BY INDEX_NAME, SEQ_IN_INDEX"
        );
        let rows = super::fetch(driver, &sql).await?;

        let mut indexes: Vec<IndexInfo> = Vec::new();
        for row in rows {
            let name = row.get("name").and_then(|v| v.as_text()).unwrap_or_default();
            let column = row.get("column_name").and_then(|v| v.as_text()).unwrap_or_default();
            let non_unique = row.get("non_unique").and_then(|v| v.as_int()).unwrap_or(1) != 0;

            if let Some(existing) = indexes.iter_mut().find(|i| i.name == name) {
                existing.columns.push(column);
            } else {
                indexes.push(IndexInfo {
                    primary: name == "PRIMARY",
                    unique: !non_unique,
                    name,
                    columns: vec![column],
                });
            }
        }
        Ok(indexes)
    }

    async fn get_table_foreign_keys(
        &self,
        driver: &mut dyn Driver,
        table: &str,
        database: Option<&str>,
    ) -> Result<Vec<ForeignKeyInfo>> {
        let db = database.map(|d| format!("'{d}'")).unwrap_or_else(|| "DATABASE()".to_string());
        let sql = format!(
            "SELECT rc.CONSTRAINT_NAME AS name, kcu.COLUMN_NAME AS column_name, \
             kcu.REFERENCED_TABLE_NAME AS ref_table, kcu.REFERENCED_COLUMN_NAME AS ref_column, \
             rc.DELETE_RULE AS on_delete, rc.UPDATE_RULE AS on_update \
             FROM INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS rc \
             JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu \
               ON kcu.CONSTRAINT_NAME = rc.CONSTRAINT_NAME AND kcu.TABLE_SCHEMA = rc.CONSTRAINT_SCHEMA \
             WHERE rc.CONSTRAINT_SCHEMA = {db} AND rc.TABLE_NAME = '{table}'"
        );
        let rows = super::fetch(driver, &sql).await?;

        let mut fks: Vec<ForeignKeyInfo> = Vec::new();
        for row in rows {
            let name = row.get("name").and_then(|v| v.as_text()).unwrap_or_default();
            let column = row.get("column_name").and_then(|v| v.as_text()).unwrap_or_default();
            let ref_table = row.get("ref_table").and_then(|v| v.as_text()).unwrap_or_default();
            let ref_column = row.get("ref_column").and_then(|v| v.as_text()).unwrap_or_default();

            if let Some(existing) = fks.iter_mut().find(|f| f.name == name) {
                existing.local_columns.push(column);
                existing.referenced_columns.push(ref_column);
            } else {
                fks.push(ForeignKeyInfo {
                    name,
                    local_columns: vec![column],
                    referenced_table: ref_table,
                    referenced_columns: vec![ref_column],
                    on_delete: row.get("on_delete").and_then(|v| v.as_text()),
                    on_update: row.get("on_update").and_then(|v| v.as_text()),
                });
            }
        }
        Ok(fks)
    }
}
