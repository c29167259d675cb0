//! Schema introspection assets and a caching manager.

use std::collections::HashMap;

use crate::connection::Connection;
use crate::error::Result;
use crate::platform::{ColumnInfo, ForeignKeyInfo, IndexInfo};
use crate::types::BaseType;

/// Splits `name` into `(namespace, bare_name, quoted)`. An identifier
/// beginning with `` ` ``, `"`, or `[` is flagged quoted and those quote
/// bytes are stripped before storage.
fn split_identifier(name: &str) -> (Option<String>, String, bool) {
    let quoted = matches!(name.chars().next(), Some('`') | Some('"') | Some('['));
    let trimmed: String = name.chars().filter(|c| !matches!(c, '`' | '"' | '[' | ']')).collect();
    match trimmed.split_once('.') {
        Some((ns, rest)) => (Some(ns.to_string()), rest.to_string(), quoted),
        None => (None, trimmed, quoted),
    }
}

#[derive(Debug, Clone)]
pub struct View {
    pub namespace: Option<String>,
    pub name: String,
    pub quoted: bool,
    pub sql: String,
}

impl View {
    pub fn new(name: &str, sql: impl Into<String>) -> Self {
        let (namespace, name, quoted) = split_identifier(name);
        View { namespace, name, quoted, sql: sql.into() }
    }

    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    pub namespace: Option<String>,
    pub name: String,
    pub quoted: bool,
    pub ty: BaseType,
    pub length: Option<u64>,
    pub unsigned: bool,
    pub notnull: bool,
    pub default: Option<String>,
    pub autoincrement: bool,
    pub comment: Option<String>,
}

impl Column {
    pub fn from_info(info: ColumnInfo) -> Self {
        let (namespace, name, quoted) = split_identifier(&info.name);
        Column {
            namespace,
            name,
            quoted,
            ty: info.ty,
            length: info.length,
            unsigned: info.unsigned,
            notnull: info.notnull,
            default: info.default,
            autoincrement: info.autoincrement,
            comment: info.comment,
        }
    }

    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub primary: bool,
}

impl Index {
    pub fn from_info(info: IndexInfo) -> Self {
        Index {
            name: info.name,
            columns: info.columns,
            unique: info.unique || info.primary,
            primary: info.primary,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub name: String,
    pub local_columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
}

impl ForeignKey {
    pub fn from_info(info: ForeignKeyInfo) -> Self {
        ForeignKey {
            name: info.name,
            local_columns: info.local_columns,
            referenced_table: info.referenced_table,
            referenced_columns: info.referenced_columns,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    pub namespace: Option<String>,
    pub name: String,
    pub quoted: bool,
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Something a containment test can be run against: a bare name, or an asset
/// that has one.
pub trait NamedAsset {
    fn asset_name(&self) -> String;
}

impl NamedAsset for &str {
    fn asset_name(&self) -> String {
        self.to_string()
    }
}

impl NamedAsset for Table {
    fn asset_name(&self) -> String {
        self.full_name()
    }
}

impl NamedAsset for View {
    fn asset_name(&self) -> String {
        self.full_name()
    }
}

/// Memoizing wrapper over [`crate::platform::Platform`] introspection,
/// materializing the normalized query results into asset objects.
///
/// Cached by `(method, args)`; `bypass_cache` forces one live re-fetch and
/// refreshes the stale entry.
pub struct SchemaManager {
    cache: HashMap<String, CacheEntry>,
    pub bypass_cache: bool,
}

#[derive(Clone)]
enum CacheEntry {
    DatabaseNames(Vec<String>),
    Views(Vec<View>),
    TableNames(Vec<String>),
    TableColumns(Vec<Column>),
    TableIndexes(Vec<Index>),
    TableForeignKeys(Vec<ForeignKey>),
}

impl Default for SchemaManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaManager {
    pub fn new() -> Self {
        SchemaManager { cache: HashMap::new(), bypass_cache: false }
    }

    fn cache_key(method: &str, args: &[&str]) -> String {
        format!("{method}({})", args.join(","))
    }

    pub async fn get_database_names(&mut self, connection: &mut Connection) -> Result<Vec<String>> {
        let key = Self::cache_key("get_database_names", &[]);
        if !self.bypass_cache
            && let Some(CacheEntry::DatabaseNames(v)) = self.cache.get(&key) {
                return Ok(v.clone());
            }
        connection.ensure_connected().await?;
        let (platform, driver) = connection.platform_and_driver_mut();
        let names = platform.get_database_names(driver).await?;
        self.cache.insert(key, CacheEntry::DatabaseNames(names.clone()));
        Ok(names)
    }

    pub async fn get_views(&mut self, connection: &mut Connection, database: Option<&str>) -> Result<Vec<View>> {
        let key = Self::cache_key("get_views", &[database.unwrap_or("")]);
        if !self.bypass_cache
            && let Some(CacheEntry::Views(v)) = self.cache.get(&key) {
                return Ok(v.clone());
            }
        connection.ensure_connected().await?;
        let (platform, driver) = connection.platform_and_driver_mut();
        let raw = platform.get_views(driver, database).await?;
        let views: Vec<View> = raw.into_iter().map(|(name, sql)| View::new(&name, sql)).collect();
        self.cache.insert(key, CacheEntry::Views(views.clone()));
        Ok(views)
    }

    pub async fn get_view_names(&mut self, connection: &mut Connection, database: Option<&str>) -> Result<Vec<String>> {
        Ok(self.get_views(connection, database).await?.into_iter().map(|v| v.full_name()).collect())
    }

    pub async fn get_table_names(&mut self, connection: &mut Connection, database: Option<&str>) -> Result<Vec<String>> {
        let key = Self::cache_key("get_table_names", &[database.unwrap_or("")]);
        if !self.bypass_cache
            && let Some(CacheEntry::TableNames(v)) = self.cache.get(&key) {
                return Ok(v.clone());
            }
        connection.ensure_connected().await?;
        let (platform, driver) = connection.platform_and_driver_mut();
        let names = platform.get_tables(driver, database).await?;
        self.cache.insert(key, CacheEntry::TableNames(names.clone()));
        Ok(names)
    }

    pub async fn get_table_columns(
        &mut self,
        connection: &mut Connection,
        table: &str,
        database: Option<&str>,
    ) -> Result<Vec<Column>> {
        let key = Self::cache_key("get_table_columns", &[table, database.unwrap_or("")]);
        if !self.bypass_cache
            && let Some(CacheEntry::TableColumns(v)) = self.cache.get(&key) {
                return Ok(v.clone());
            }
        connection.ensure_connected().await?;
        let (platform, driver) = connection.platform_and_driver_mut();
        let raw = platform.get_table_columns(driver, table, database).await?;
        let columns: Vec<Column> = raw.into_iter().map(Column::from_info).collect();
        self.cache.insert(key, CacheEntry::TableColumns(columns.clone()));
        Ok(columns)
    }

    pub async fn get_table_indexes(
        &mut self,
        connection: &mut Connection,
        table: &str,
        database: Option<&str>,
    ) -> Result<Vec<Index>> {
        let key = Self::cache_key("get_table_indexes", &[table, database.unwrap_or("")]);
        if !self.bypass_cache
            && let Some(CacheEntry::TableIndexes(v)) = self.cache.get(&key) {
                return Ok(v.clone());
            }
        connection.ensure_connected().await?;
        let (platform, driver) = connection.platform_and_driver_mut();
        let raw = platform.get_table_indexes(driver, table, database).await?;
        let indexes: Vec<Index> = raw.into_iter().map(Index::from_info).collect();
        self.cache.insert(key, CacheEntry::TableIndexes(indexes.clone()));
        Ok(indexes)
    }

    pub async fn get_table_foreign_keys(
        &mut self,
        connection: &mut Connection,
        table: &str,
        database: Option<&str>,
    ) -> Result<Vec<ForeignKey>> {
        let key = Self::cache_key("get_table_foreign_keys", &[table, database.unwrap_or("")]);
        if !self.bypass_cache
            && let Some(CacheEntry::TableForeignKeys(v)) = self.cache.get(&key) {
                return Ok(v.clone());
            }
        connection.ensure_connected().await?;
        let (platform, driver) = connection.platform_and_driver_mut();
        let raw = platform.get_table_foreign_keys(driver, table, database).await?;
        let fks: Vec<ForeignKey> = raw.into_iter().map(ForeignKey::from_info).collect();
        self.cache.insert(key, CacheEntry::TableForeignKeys(fks.clone()));
        Ok(fks)
    }

    pub async fn get_table(&mut self, connection: &mut Connection, table: &str, database: Option<&str>) -> Result<Table> {
        let columns = self.get_table_columns(connection, table, database).await?;
        let indexes = self.get_table_indexes(connection, table, database).await?;
        let foreign_keys = self.get_table_foreign_keys(connection, table, database).await?;
        let (namespace, name, quoted) = split_identifier(table);
        Ok(Table { namespace, name, quoted, columns, indexes, foreign_keys })
    }

    /// Case-insensitive containment test against the live table list.
    pub async fn contains_table(&mut self, connection: &mut Connection, item: impl NamedAsset) -> Result<bool> {
        let target = item.asset_name().to_lowercase();
        let names = self.get_table_names(connection, None).await?;
        Ok(names.iter().any(|n| n.to_lowercase() == target))
    }

    pub async fn contains_view(&mut self, connection: &mut Connection, item: impl NamedAsset) -> Result<bool> {
        let target = item.asset_name().to_lowercase();
        let names = self.get_view_names(connection, None).await?;
        Ok(names.iter().any(|n| n.to_lowercase() == target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_quoted_namespaced_identifier() {
        let (ns, name, quoted) = split_identifier("`mydb`.`users`");
        assert_eq!(ns.as_deref(), Some("mydb"));
        assert_eq!(name, "users");
        assert!(quoted);
    }

    #[test]
    fn unquoted_identifier_has_no_namespace() {
        let (ns, name, quoted) = split_identifier("users");
        assert_eq!(ns, None);
        assert_eq!(name, "users");
        assert!(!quoted);
    }
}
