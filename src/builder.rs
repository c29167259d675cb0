//! Fluent SQL builder.
//!
//! Parts are accumulated into typed fields rather than a string-keyed dict,
//! with a dirty-tracked render cache and a `values()`-replaces vs
//! `set_value()`-merges split — each serves a different calling convention
//! (bulk-set vs incremental build) and both are kept under their own name.

use std::collections::HashMap;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::expr::CompositeExpression;
use crate::statement::{FetchMode, Params, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    fn word(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
        }
    }
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    table: String,
    alias: String,
    condition: CompositeExpression,
}

#[derive(Debug, Clone, Default)]
struct FromClause {
    table: String,
    alias: Option<String>,
}

/// Outcome of [`SQLBuilder::execute`].
#[derive(Debug, Clone)]
pub enum ExecuteOutcome {
    /// `SELECT`: the fetched rows.
    Rows(Vec<crate::statement::Row>),
    /// `INSERT`: the new row's ID.
    LastInsertId(i64),
    /// `UPDATE`/`DELETE`: the number of affected rows.
    RowsAffected(u64),
}

/// Fluent, dirty-tracked SQL assembler. One instance builds exactly one
/// statement; call [`SQLBuilder::execute`] to run it against a [`Connection`].
#[derive(Debug, Clone)]
pub struct SQLBuilder {
    kind: StatementKind,
    select: Vec<String>,
    from: Vec<FromClause>,
    joins: HashMap<String, Vec<Join>>,
    set: Vec<String>,
    values: Vec<(String, String)>,
    where_: Option<CompositeExpression>,
    group_by: Vec<String>,
    having: Option<CompositeExpression>,
    order_by: Vec<String>,
    first_result: Option<i64>,
    max_results: Option<i64>,
    params: Params,
    param_counter: u64,
    sql_cache: Option<String>,
    dirty: bool,
}

impl Default for SQLBuilder {
    fn default() -> Self {
        SQLBuilder {
            kind: StatementKind::Select,
            select: Vec::new(),
            from: Vec::new(),
            joins: HashMap::new(),
            set: Vec::new(),
            values: Vec::new(),
            where_: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            first_result: None,
            max_results: None,
            params: Params::new(),
            param_counter: 0,
            sql_cache: None,
            dirty: true,
        }
    }
}

impl SQLBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn get_type(&self) -> StatementKind {
        self.kind
    }

    pub fn select(&mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.kind = StatementKind::Select;
        self.select = columns.into_iter().map(Into::into).collect();
        self.mark_dirty();
        self
    }

    pub fn add_select(&mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.kind = StatementKind::Select;
        self.select.extend(columns.into_iter().map(Into::into));
        self.mark_dirty();
        self
    }

    pub fn from(&mut self, table: impl Into<String>, alias: Option<&str>) -> &mut Self {
        self.from.push(FromClause {
            table: table.into(),
            alias: alias.map(str::to_string),
        });
        self.mark_dirty();
        self
    }

    pub fn insert(&mut self, table: impl Into<String>) -> &mut Self {
        self.kind = StatementKind::Insert;
        self.from = vec![FromClause { table: table.into(), alias: None }];
        self.mark_dirty();
        self
    }

    pub fn update(&mut self, table: impl Into<String>, alias: Option<&str>) -> &mut Self {
        self.kind = StatementKind::Update;
        self.from = vec![FromClause { table: table.into(), alias: alias.map(str::to_string) }];
        self.mark_dirty();
        self
    }

    pub fn delete(&mut self, table: impl Into<String>, alias: Option<&str>) -> &mut Self {
        self.kind = StatementKind::Delete;
        self.from = vec![FromClause { table: table.into(), alias: alias.map(str::to_string) }];
        self.mark_dirty();
        self
    }

    fn add_join(&mut self, from_alias: &str, kind: JoinKind, table: &str, alias: &str, condition: CompositeExpression) -> &mut Self {
        self.joins.entry(from_alias.to_string()).or_default().push(Join {
            kind,
            table: table.to_string(),
            alias: alias.to_string(),
            condition,
        });
        self.mark_dirty();
        self
    }

    pub fn inner_join(&mut self, from_alias: &str, table: &str, alias: &str, conditions: Vec<String>) -> &mut Self {
        let condition = CompositeExpression::and_of(conditions);
        self.add_join(from_alias, JoinKind::Inner, table, alias, condition)
    }

    pub fn left_join(&mut self, from_alias: &str, table: &str, alias: &str, conditions: Vec<String>) -> &mut Self {
        let condition = CompositeExpression::and_of(conditions);
        self.add_join(from_alias, JoinKind::Left, table, alias, condition)
    }

    pub fn right_join(&mut self, from_alias: &str, table: &str, alias: &str, conditions: Vec<String>) -> &mut Self {
        let condition = CompositeExpression::and_of(conditions);
        self.add_join(from_alias, JoinKind::Right, table, alias, condition)
    }

    pub fn set(&mut self, column: &str, value: &str) -> &mut Self {
        self.set.push(format!("{column} = {value}"));
        self.mark_dirty();
        self
    }

    pub fn where_(&mut self, conditions: Vec<String>) -> &mut Self {
        self.where_ = Some(CompositeExpression::and_of(conditions));
        self.mark_dirty();
        self
    }

    pub fn and_where(&mut self, condition: impl Into<String>) -> &mut Self {
        let mut parts = Vec::new();
        if let Some(existing) = &self.where_ {
            parts.push(existing.to_string());
        }
        parts.push(condition.into());
        self.where_ = Some(CompositeExpression::and_of(parts));
        self.mark_dirty();
        self
    }

    pub fn or_where(&mut self, condition: impl Into<String>) -> &mut Self {
        let mut parts = Vec::new();
        if let Some(existing) = &self.where_ {
            parts.push(existing.to_string());
        }
        parts.push(condition.into());
        self.where_ = Some(CompositeExpression::or_of(parts));
        self.mark_dirty();
        self
    }

    pub fn group_by(&mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.group_by = columns.into_iter().map(Into::into).collect();
        self.mark_dirty();
        self
    }

    pub fn add_group_by(&mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.group_by.extend(columns.into_iter().map(Into::into));
        self.mark_dirty();
        self
    }

    pub fn having(&mut self, conditions: Vec<String>) -> &mut Self {
        self.having = Some(CompositeExpression::and_of(conditions));
        self.mark_dirty();
        self
    }

    pub fn and_having(&mut self, condition: impl Into<String>) -> &mut Self {
        let mut parts = Vec::new();
        if let Some(existing) = &self.having {
            parts.push(existing.to_string());
        }
        parts.push(condition.into());
        self.having = Some(CompositeExpression::and_of(parts));
        self.mark_dirty();
        self
    }

    pub fn or_having(&mut self, condition: impl Into<String>) -> &mut Self {
        let mut parts = Vec::new();
        if let Some(existing) = &self.having {
            parts.push(existing.to_string());
        }
        parts.push(condition.into());
        self.having = Some(CompositeExpression::or_of(parts));
        self.mark_dirty();
        self
    }

    pub fn order_by(&mut self, sort: &str, order: &str) -> &mut Self {
        self.order_by = vec![format!("{sort} {}", order.to_ascii_uppercase())];
        self.mark_dirty();
        self
    }

    pub fn add_order_by(&mut self, sort: &str, order: &str) -> &mut Self {
        self.order_by.push(format!("{sort} {}", order.to_ascii_uppercase()));
        self.mark_dirty();
        self
    }

    pub fn set_first_result(&mut self, first_result: i64) -> &mut Self {
        self.first_result = Some(first_result);
        self.mark_dirty();
        self
    }

    pub fn set_max_results(&mut self, max_results: i64) -> &mut Self {
        self.max_results = Some(max_results);
        self.mark_dirty();
        self
    }

    /// Merges one column into the existing values bag without clearing the rest.
    pub fn set_value(&mut self, column: &str, value: &str) -> &mut Self {
        if let Some(existing) = self.values.iter_mut().find(|(c, _)| c == column) {
            existing.1 = value.to_string();
        } else {
            self.values.push((column.to_string(), value.to_string()));
        }
        self.mark_dirty();
        self
    }

    /// Replaces the whole values bag.
    pub fn values(&mut self, values: Vec<(String, String)>) -> &mut Self {
        self.values = values;
        self.mark_dirty();
        self
    }

    /// Allocates a `:pyValue<k>` placeholder and records `value` under it, or,
    /// if `placeholder` is given, records `value` under that name instead
    /// (with its leading `:` stripped) and returns it unchanged.
    pub fn create_named_parameter(&mut self, value: impl Into<Value>, placeholder: Option<&str>) -> String {
        match placeholder {
            Some(p) => {
                let name = p.strip_prefix(':').unwrap_or(p);
                self.params.set_named(name, value.into());
                p.to_string()
            }
            None => {
                let name = format!("pyValue{}", self.param_counter);
                self.param_counter += 1;
                self.params.set_named(name.clone(), value.into());
                format!(":{name}")
            }
        }
    }

    pub fn create_positional_parameter(&mut self, value: impl Into<Value>) -> String {
        self.param_counter += 1;
        self.params.push_positional(value.into());
        "?".to_string()
    }

    pub fn get_parameters(&self) -> &Params {
        &self.params
    }

    fn get_from_clauses(&self) -> Result<Vec<String>> {
        let mut known_aliases: Vec<String> = Vec::new();
        let mut clauses = Vec::with_capacity(self.from.len());

        for from in &self.from {
            let reference = from.alias.clone().unwrap_or_else(|| from.table.clone());
            let table_sql = match &from.alias {
                Some(alias) => format!("{} {}", from.table, alias),
                None => from.table.clone(),
            };
            known_aliases.push(reference.clone());
            let join_sql = self.render_joins(&reference, &mut known_aliases)?;
            clauses.push(format!("{table_sql}{join_sql}"));
        }

        for from_alias in self.joins.keys() {
            if !known_aliases.contains(from_alias) {
                return Err(Error::unknown_alias(from_alias, &known_aliases));
            }
        }
        Ok(clauses)
    }

    fn render_joins(&self, from_alias: &str, known_aliases: &mut Vec<String>) -> Result<String> {
        let mut sql = String::new();
        let Some(joins) = self.joins.get(from_alias) else {
            return Ok(sql);
        };

        for join in joins {
            if known_aliases.contains(&join.alias) {
                return Err(Error::non_unique_alias(&join.alias, known_aliases));
            }
            sql.push_str(&format!(
                " {} JOIN {} {} ON {}",
                join.kind.word(),
                join.table,
                join.alias,
                join.condition
            ));
            known_aliases.push(join.alias.clone());
        }
        for join in joins {
            sql.push_str(&self.render_joins(&join.alias, known_aliases)?);
        }
        Ok(sql)
    }

    fn sql_for_select(&self, platform: &dyn crate::platform::Platform) -> Result<String> {
        let mut sql = format!("SELECT {} FROM {}", self.select.join(", "), self.get_from_clauses()?.join(", "));
        if let Some(where_) = &self.where_ {
            sql.push_str(&format!(" WHERE {where_}"));
        }
        if !self.group_by.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", self.group_by.join(", ")));
        }
        if let Some(having) = &self.having {
            sql.push_str(&format!(" HAVING {having}"));
        }
        if !self.order_by.is_empty() {
            sql.push_str(&format!(" ORDER BY {}", self.order_by.join(", ")));
        }
        if self.max_results.is_some() || self.first_result.is_some() {
            sql = platform.modify_limit_sql(&sql, self.max_results, self.first_result)?;
        }
        Ok(sql)
    }

    fn sql_for_insert(&self) -> String {
        let columns: Vec<&str> = self.values.iter().map(|(c, _)| c.as_str()).collect();
        let placeholders: Vec<&str> = self.values.iter().map(|(_, v)| v.as_str()).collect();
        format!(
            "INSERT INTO {} ({}) VALUES({})",
            self.from[0].table,
            columns.join(", "),
            placeholders.join(", ")
        )
    }

    fn sql_for_update(&self) -> String {
        let mut sql = format!("UPDATE {}", self.from[0].table);
        if let Some(alias) = &self.from[0].alias {
            sql.push_str(&format!(" {alias}"));
        }
        if !self.set.is_empty() {
            sql.push_str(&format!(" SET {}", self.set.join(", ")));
        }
        if let Some(where_) = &self.where_ {
            sql.push_str(&format!(" WHERE {where_}"));
        }
        sql
    }

    fn sql_for_delete(&self) -> String {
        let mut sql = format!("DELETE FROM {}", self.from[0].table);
        if let Some(alias) = &self.from[0].alias {
            sql.push_str(&format!(" {alias}"));
        }
        if let Some(where_) = &self.where_ {
            sql.push_str(&format!(" WHERE {where_}"));
        }
        sql
    }

    /// Renders this builder's SQL, using the cached render unless a mutator
    /// has run since the last call.
    pub fn get_sql(&mut self, platform: &dyn crate::platform::Platform) -> Result<&str> {
        if self.dirty || self.sql_cache.is_none() {
            let rendered = match self.kind {
                StatementKind::Insert => self.sql_for_insert(),
                StatementKind::Delete => self.sql_for_delete(),
                StatementKind::Update => self.sql_for_update(),
                StatementKind::Select => self.sql_for_select(platform)?,
            };
            self.sql_cache = Some(rendered);
            self.dirty = false;
        }
        Ok(self.sql_cache.as_deref().unwrap())
    }

    /// Renders and runs this builder against `connection`.
    pub async fn execute(&mut self, connection: &mut Connection) -> Result<ExecuteOutcome> {
        let sql = {
            let platform = connection.platform();
            self.get_sql(platform)?.to_string()
        };

        match self.kind {
            StatementKind::Select => {
                let rows = connection.query(&sql, self.params.clone()).await?;
                Ok(ExecuteOutcome::Rows(rows))
            }
            StatementKind::Insert => {
                connection.execute(&sql, self.params.clone()).await?;
                Ok(ExecuteOutcome::LastInsertId(connection.last_insert_id()))
            }
            StatementKind::Update | StatementKind::Delete => {
                let affected = connection.execute(&sql, self.params.clone()).await?;
                Ok(ExecuteOutcome::RowsAffected(affected))
            }
        }
    }

    pub fn fetch_mode_hint(&self) -> FetchMode {
        FetchMode::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::sqlite::SqlitePlatform;

    #[test]
    fn renders_simple_select() {
        let mut b = SQLBuilder::new();
        b.select(["id", "name"]).from("users", None);
        let sql = b.get_sql(&SqlitePlatform::new()).unwrap();
        assert_eq!(sql, "SELECT id, name FROM users");
    }

    #[test]
    fn renders_join_chain_with_on_condition() {
        let mut b = SQLBuilder::new();
        b.select(["u.id"]).from("users", Some("u"));
        b.inner_join("u", "orders", "o", vec!["u.id = o.user_id".to_string()]);
        let sql = b.get_sql(&SqlitePlatform::new()).unwrap();
        assert_eq!(sql, "SELECT u.id FROM users u INNER JOIN orders o ON u.id = o.user_id");
    }

    #[test]
    fn unknown_join_alias_errors() {
        let mut b = SQLBuilder::new();
        b.select(["id"]).from("users", Some("u"));
        b.inner_join("missing", "orders", "o", vec!["1 = 1".to_string()]);
        assert!(matches!(b.get_sql(&SqlitePlatform::new()), Err(Error::UnknownAlias(..))));
    }

    #[test]
    fn renders_insert_from_values_bag() {
        let mut b = SQLBuilder::new();
        b.insert("users");
        b.set_value("name", "?");
        b.set_value("age", "?");
        let sql = b.get_sql(&SqlitePlatform::new()).unwrap();
        assert_eq!(sql, "INSERT INTO users (name, age) VALUES(?, ?)");
    }

    #[test]
    fn values_replaces_while_set_value_merges() {
        let mut b = SQLBuilder::new();
        b.insert("users");
        b.set_value("name", "?");
        b.values(vec![("age".to_string(), "?".to_string())]);
        let sql = b.get_sql(&SqlitePlatform::new()).unwrap();
        assert_eq!(sql, "INSERT INTO users (age) VALUES(?)");
    }

    #[test]
    fn renders_update_with_where() {
        let mut b = SQLBuilder::new();
        b.update("users", None);
        b.set("name", "?");
        b.and_where("id = ?");
        let sql = b.get_sql(&SqlitePlatform::new()).unwrap();
        assert_eq!(sql, "UPDATE users SET name = ? WHERE id = ?");
    }

    #[test]
    fn create_named_parameter_allocates_when_none_given() {
        let mut b = SQLBuilder::new();
        let placeholder = b.create_named_parameter(1i64, None);
        assert_eq!(placeholder, ":pyValue0");
        let (sql, bound) = crate::statement::rewrite("SELECT :pyValue0", b.get_parameters(), "?").unwrap();
        assert_eq!(sql, "SELECT ?");
        assert_eq!(bound, vec![Value::Int(1)]);
    }

    #[test]
    fn create_named_parameter_uses_caller_supplied_name() {
        let mut b = SQLBuilder::new();
        let placeholder = b.create_named_parameter(42i64, Some(":user_id"));
        assert_eq!(placeholder, ":user_id");
        let (sql, bound) = crate::statement::rewrite("SELECT :user_id", b.get_parameters(), "?").unwrap();
        assert_eq!(sql, "SELECT ?");
        assert_eq!(bound, vec![Value::Int(42)]);
    }
}
