//! Boolean expression algebra used by `WHERE`/`HAVING`/join conditions.
//!
//! `ExpressionBuilder` is a set of stateless helpers that produce raw string
//! predicates; `CompositeExpression` folds them (or other composites) into an
//! `AND`/`OR` tree and knows how to render itself back to SQL text.

use std::fmt;

/// The boolean connective joining a composite's parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeType {
    And,
    Or,
}

impl CompositeType {
    fn word(self) -> &'static str {
        match self {
            CompositeType::And => "AND",
            CompositeType::Or => "OR",
        }
    }
}

/// One part of a composite expression: either a raw predicate string or a
/// nested composite. Parts that are empty strings, or nested composites with
/// zero surviving parts, are dropped on insertion rather than rendered.
#[derive(Debug, Clone)]
pub enum ExprPart {
    Raw(String),
    Composite(CompositeExpression),
}

impl fmt::Display for ExprPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprPart::Raw(s) => write!(f, "{s}"),
            ExprPart::Composite(c) => write!(f, "{c}"),
        }
    }
}

/// An `AND`/`OR` tree of predicates.
///
/// A single-part composite renders as just that part, unparenthesized. A
/// composite with two or more parts renders as `(p1) TYPE (p2) TYPE ...`.
#[derive(Debug, Clone)]
pub struct CompositeExpression {
    ty: CompositeType,
    parts: Vec<ExprPart>,
}

impl CompositeExpression {
    pub fn new(ty: CompositeType) -> Self {
        CompositeExpression {
            ty,
            parts: Vec::new(),
        }
    }

    pub fn and_of(parts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut c = CompositeExpression::new(CompositeType::And);
        for p in parts {
            c.add_raw(p.into());
        }
        c
    }

    pub fn or_of(parts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut c = CompositeExpression::new(CompositeType::Or);
        for p in parts {
            c.add_raw(p.into());
        }
        c
    }

    pub fn ty(&self) -> CompositeType {
        self.ty
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Appends a raw predicate string; empty strings are silently dropped.
    pub fn add_raw(&mut self, part: impl Into<String>) -> &mut Self {
        let part = part.into();
        if !part.is_empty() {
            self.parts.push(ExprPart::Raw(part));
        }
        self
    }

    /// Appends a nested composite; composites with no surviving parts are
    /// silently dropped.
    pub fn add_composite(&mut self, part: CompositeExpression) -> &mut Self {
        if !part.is_empty() {
            self.parts.push(ExprPart::Composite(part));
        }
        self
    }
}

impl fmt::Display for CompositeExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parts.len() == 1 {
            return write!(f, "{}", self.parts[0]);
        }
        let word = self.ty.word();
        let rendered: Vec<String> = self.parts.iter().map(|p| format!("({p})")).collect();
        write!(f, "{}", rendered.join(&format!(" {word} ")))
    }
}

/// Comparison and composition operators rendered as plain SQL text.
///
/// All methods here are pure string assembly; parameter placeholders are
/// expected to already have been allocated via the builder before being
/// passed in as `y`.
pub struct ExpressionBuilder;

impl ExpressionBuilder {
    pub fn and_x(parts: impl IntoIterator<Item = impl Into<String>>) -> CompositeExpression {
        CompositeExpression::and_of(parts)
    }

    pub fn or_x(parts: impl IntoIterator<Item = impl Into<String>>) -> CompositeExpression {
        CompositeExpression::or_of(parts)
    }

    fn comparison(x: &str, op: &str, y: &str) -> String {
        format!("{x} {op} {y}")
    }

    pub fn eq(x: &str, y: &str) -> String {
        Self::comparison(x, "=", y)
    }

    pub fn neq(x: &str, y: &str) -> String {
        Self::comparison(x, "<>", y)
    }

    pub fn lt(x: &str, y: &str) -> String {
        Self::comparison(x, "<", y)
    }

    pub fn lte(x: &str, y: &str) -> String {
        Self::comparison(x, "<=", y)
    }

    pub fn gt(x: &str, y: &str) -> String {
        Self::comparison(x, ">", y)
    }

    pub fn gte(x: &str, y: &str) -> String {
        Self::comparison(x, ">=", y)
    }

    pub fn is_null(x: &str) -> String {
        format!("{x} IS NULL")
    }

    pub fn is_not_null(x: &str) -> String {
        format!("{x} IS NOT NULL")
    }

    pub fn like(x: &str, y: &str) -> String {
        Self::comparison(x, "LIKE", y)
    }

    pub fn not_like(x: &str, y: &str) -> String {
        Self::comparison(x, "NOT LIKE", y)
    }

    pub fn in_(x: &str, values: &[String]) -> String {
        format!("{x} IN ({})", values.join(", "))
    }

    pub fn not_in(x: &str, values: &[String]) -> String {
        format!("{x} NOT IN ({})", values.join(", "))
    }

    /// Delegates to the driver's engine-specific string escape.
    pub fn literal(driver: &dyn crate::driver::Driver, value: &str) -> String {
        driver.escape_string(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_part_composite_has_no_parens() {
        let c = CompositeExpression::and_of(["a = 1"]);
        assert_eq!(c.to_string(), "a = 1");
    }

    #[test]
    fn multi_part_composite_parenthesizes_and_joins() {
        let c = CompositeExpression::and_of(["a = 1", "b = 2", "c = 3"]);
        assert_eq!(c.to_string(), "(a = 1) AND (b = 2) AND (c = 3)");
    }

    #[test]
    fn or_composite_uses_or_word() {
        let c = CompositeExpression::or_of(["a = 1", "b = 2"]);
        assert_eq!(c.to_string(), "(a = 1) OR (b = 2)");
    }

    #[test]
    fn empty_parts_are_filtered() {
        let mut c = CompositeExpression::new(CompositeType::And);
        c.add_raw("");
        c.add_raw("a = 1");
        assert_eq!(c.len(), 1);
        assert_eq!(c.to_string(), "a = 1");
    }

    #[test]
    fn empty_nested_composite_is_dropped() {
        let mut c = CompositeExpression::new(CompositeType::And);
        c.add_raw("a = 1");
        c.add_composite(CompositeExpression::new(CompositeType::Or));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn nested_composite_renders_recursively() {
        let mut inner = CompositeExpression::new(CompositeType::Or);
        inner.add_raw("b = 2");
        inner.add_raw("c = 3");

        let mut outer = CompositeExpression::new(CompositeType::And);
        outer.add_raw("a = 1");
        outer.add_composite(inner);

        assert_eq!(outer.to_string(), "(a = 1) AND ((b = 2) OR (c = 3))");
    }

    #[test]
    fn in_renders_parenthesized_list() {
        assert_eq!(
            ExpressionBuilder::in_("b", &["?".into(), "?".into()]),
            "b IN (?, ?)"
        );
    }
}
