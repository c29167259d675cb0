//! Symbolic column-type registry consumed by the schema layer.
//!
//! The driver and platform boundary is otherwise untyped SQL text; this enum
//! is the one place a column's underlying database type gets a stable,
//! engine-independent tag.

use crate::error::Error;

/// A symbolic column type, independent of any one engine's native type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Array,
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Decimal,
    Float,
    String,
    Text,
    Binary,
    Blob,
    Date,
    Time,
    DateTime,
    Guid,
}

impl BaseType {
    pub fn name(self) -> &'static str {
        match self {
            BaseType::Array => "array",
            BaseType::Boolean => "boolean",
            BaseType::SmallInt => "smallint",
            BaseType::Integer => "integer",
            BaseType::BigInt => "bigint",
            BaseType::Decimal => "decimal",
            BaseType::Float => "float",
            BaseType::String => "string",
            BaseType::Text => "text",
            BaseType::Binary => "binary",
            BaseType::Blob => "blob",
            BaseType::Date => "date",
            BaseType::Time => "time",
            BaseType::DateTime => "datetime",
            BaseType::Guid => "guid",
        }
    }

    /// Looks a type up by its symbolic name, e.g. as produced by a platform's
    /// comment-override (`(DBALType:X)`) or a mapped native type string.
    pub fn from_name(name: &str) -> Result<Self, Error> {
        Ok(match name {
            "array" => BaseType::Array,
            "boolean" => BaseType::Boolean,
            "smallint" => BaseType::SmallInt,
            "integer" => BaseType::Integer,
            "bigint" => BaseType::BigInt,
            "decimal" => BaseType::Decimal,
            "float" => BaseType::Float,
            "string" => BaseType::String,
            "text" => BaseType::Text,
            "binary" => BaseType::Binary,
            "blob" => BaseType::Blob,
            "date" => BaseType::Date,
            "time" => BaseType::Time,
            "datetime" => BaseType::DateTime,
            "guid" => BaseType::Guid,
            other => return Err(Error::unknown_type(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_name() {
        for ty in [
            BaseType::Array,
            BaseType::Boolean,
            BaseType::SmallInt,
            BaseType::Integer,
            BaseType::BigInt,
            BaseType::Decimal,
            BaseType::Float,
            BaseType::String,
            BaseType::Text,
            BaseType::Binary,
            BaseType::Blob,
            BaseType::Date,
            BaseType::Time,
            BaseType::DateTime,
            BaseType::Guid,
        ] {
            assert_eq!(BaseType::from_name(ty.name()).unwrap(), ty);
        }
    }

    #[test]
    fn unknown_type_errors() {
        assert!(BaseType::from_name("nonsense").is_err());
    }
}
