//! Placeholder rewriting and row projection.
//!
//! A prepared `sql` string may mix positional (`?`) and named (`:name`)
//! placeholders. [`rewrite`] walks the string once, skipping over quoted
//! string literals, and replaces each placeholder with the driver's native
//! placeholder syntax while pulling the matching value out of `params` —
//! expanding list-valued parameters into a comma-joined run of repeated
//! placeholders.

use crate::error::{Error, Result};

/// A single bound value. Lists expand into one placeholder per element.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
    List(Vec<Value>),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl Value {
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// Named or positional lookup key for a bound parameter.
#[derive(Debug, Clone)]
pub enum ParamKey {
    Index(usize),
    Name(String),
}

/// The full set of parameters available to a rewrite pass: positional
/// values keyed by their integer index in left-to-right occurrence order,
/// plus named values keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct Params {
    positional: Vec<Value>,
    named: std::collections::HashMap<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_positional(values: Vec<Value>) -> Self {
        Params {
            positional: values,
            named: Default::default(),
        }
    }

    pub fn set_named(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.named.insert(name.into(), value.into());
        self
    }

    pub fn push_positional(&mut self, value: impl Into<Value>) -> &mut Self {
        self.positional.push(value.into());
        self
    }

    fn display_all(&self) -> Vec<String> {
        let mut out: Vec<String> = self.positional.iter().map(|v| format!("{v:?}")).collect();
        out.extend(self.named.iter().map(|(k, v)| format!("{k}={v:?}")));
        out
    }
}

/// Rewrites `sql`'s placeholders into `placeholder_char`-style native
/// placeholders (e.g. `?` for both MySQL and SQLite in this crate), expanding
/// list parameters, and returns the rewritten SQL alongside the flattened,
/// in-order bind values ready to pass to the driver.
///
/// A `?` or `:name` token is only a placeholder outside of a quoted string
/// literal. Walked by hand rather than with a lookahead regex, since the
/// `regex` crate doesn't support look-around.
pub fn rewrite(sql: &str, params: &Params, placeholder: &str) -> Result<(String, Vec<Value>)> {
    let mut out = String::with_capacity(sql.len());
    let mut bound = Vec::new();
    let mut positional_cursor = 0usize;

    let chars: Vec<char> = sql.chars().collect();
    let mut i = 0usize;
    let mut in_quote: Option<char> = None;

    while i < chars.len() {
        let c = chars[i];

        if let Some(q) = in_quote {
            out.push(c);
            if c == '\\' && i + 1 < chars.len() {
                i += 1;
                out.push(chars[i]);
            } else if c == q {
                in_quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            '\'' | '"' => {
                in_quote = Some(c);
                out.push(c);
                i += 1;
            }
            '?' => {
                let idx = positional_cursor;
                positional_cursor += 1;
                let value = params
                    .positional
                    .get(idx)
                    .cloned()
                    .ok_or_else(|| Error::missing_positional_parameter(idx, &params.display_all()))?;
                push_placeholder(&mut out, &value, placeholder, &mut bound);
                i += 1;
            }
            ':' if chars.get(i + 1).is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                let value = params
                    .named
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| Error::missing_named_parameter(&name, &params.display_all()))?;
                push_placeholder(&mut out, &value, placeholder, &mut bound);
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    Ok((out, bound))
}

fn push_placeholder(out: &mut String, value: &Value, placeholder: &str, bound: &mut Vec<Value>) {
    match value {
        Value::List(items) => {
            let rendered: Vec<&str> = items.iter().map(|_| placeholder).collect();
            out.push_str(&rendered.join(", "));
            bound.extend(items.iter().cloned());
        }
        other => {
            out.push_str(placeholder);
            bound.push(other.clone());
        }
    }
}

/// Shape requested for a fetched row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// One `HashMap<String, Value>` per row, last duplicate column wins.
    Dict,
    /// Values in select order, an immutable-in-spirit positional sequence.
    Tuple,
    /// Values in select order as a plain mutable `Vec`.
    List,
    /// Column name/value pairs, addressable by name like a lightweight struct.
    Object,
    /// The value at a single given column index.
    Column,
    /// The raw `(name, value)` pair sequence, no projection at all.
    #[default]
    Default,
}

/// A fetched row: parallel vectors of column name and value, in select order.
#[derive(Debug, Clone, Default)]
pub struct Row {
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl Row {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| &self.values[i])
    }

    /// Projects this row into the requested shape. `column_index` selects
    /// which column `FetchMode::Column` returns (default 0).
    pub fn project(&self, mode: FetchMode, column_index: usize) -> Projected {
        match mode {
            FetchMode::Dict => {
                let map = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(self.values.iter().cloned())
                    .collect();
                Projected::Dict(map)
            }
            FetchMode::Tuple => Projected::Tuple(self.values.clone()),
            FetchMode::List => Projected::List(self.values.clone()),
            FetchMode::Object => Projected::Object(self.clone()),
            FetchMode::Column => Projected::Column(self.values.get(column_index).cloned()),
            FetchMode::Default => Projected::Default(
                self.columns
                    .iter()
                    .cloned()
                    .zip(self.values.iter().cloned())
                    .collect(),
            ),
        }
    }
}

/// The result of projecting a [`Row`] through a [`FetchMode`].
#[derive(Debug, Clone)]
pub enum Projected {
    Dict(std::collections::HashMap<String, Value>),
    Tuple(Vec<Value>),
    List(Vec<Value>),
    Object(Row),
    Column(Option<Value>),
    Default(Vec<(String, Value)>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_positional_placeholders_in_order() {
        let params = Params::from_positional(vec![Value::Int(1), Value::Int(2)]);
        let (sql, bound) = rewrite("SELECT * FROM t WHERE a = ? AND b = ?", &params, "?").unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE a = ? AND b = ?");
        assert_eq!(bound.len(), 2);
    }

    #[test]
    fn rewrites_named_placeholders() {
        let mut params = Params::new();
        params.set_named("id", 42i64);
        let (sql, bound) = rewrite("SELECT * FROM t WHERE id = :id", &params, "?").unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE id = ?");
        assert_eq!(bound.len(), 1);
    }

    #[test]
    fn ignores_placeholder_like_text_inside_quotes() {
        let params = Params::from_positional(vec![Value::Int(1)]);
        let (sql, bound) =
            rewrite("SELECT * FROM t WHERE a = ? AND b = 'literal ? not a param'", &params, "?")
                .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM t WHERE a = ? AND b = 'literal ? not a param'"
        );
        assert_eq!(bound.len(), 1);
    }

    #[test]
    fn expands_list_parameter_into_repeated_placeholders() {
        let params = Params::from_positional(vec![Value::List(vec![
            Value::Int(1),
            Value::Int(2),
            Value::Int(3),
        ])]);
        let (sql, bound) = rewrite("SELECT * FROM t WHERE a IN (?)", &params, "?").unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE a IN (?, ?, ?)");
        assert_eq!(bound.len(), 3);
    }

    #[test]
    fn missing_positional_parameter_errors() {
        let params = Params::new();
        let err = rewrite("SELECT * FROM t WHERE a = ?", &params, "?").unwrap_err();
        assert!(matches!(err, Error::MissingPositionalParameter { .. }));
    }

    #[test]
    fn missing_named_parameter_errors() {
        let params = Params::new();
        let err = rewrite("SELECT * FROM t WHERE a = :missing", &params, "?").unwrap_err();
        assert!(matches!(err, Error::MissingNamedParameter { .. }));
    }

    #[test]
    fn row_projects_into_assoc_tuple_and_column() {
        let row = Row {
            columns: vec!["a".into(), "b".into()],
            values: vec![Value::Int(1), Value::Int(2)],
        };
        match row.project(FetchMode::Column, 1) {
            Projected::Column(Some(Value::Int(v))) => assert_eq!(v, 2),
            other => panic!("unexpected {other:?}"),
        }
        match row.project(FetchMode::Tuple, 0) {
            Projected::Tuple(v) => assert_eq!(v.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }
}
