//! # Error Handling Module
//!
//! A single flat error type covering every failure mode surfaced by the
//! builder, statement, platform, driver, connection and schema layers.
//! Each subkind below ships a factory constructor so call sites read as
//! `Error::unknown_alias(...)` rather than hand-building enum literals.

use thiserror::Error;

/// The root error type for this crate.
///
/// Builder and platform errors are considered user errors: they surface
/// immediately and are never retried. Driver errors may have already
/// triggered one internal reconnect attempt (MySQL) before being returned.
#[derive(Error, Debug)]
pub enum Error {
    // -- ConnectionError ----------------------------------------------------
    #[error("the given driver '{0}' is unknown, this crate currently supports only the following drivers: {1}")]
    UnknownDriver(String, String),

    #[error("connection with database is closed")]
    ConnectionClosed,

    #[error("there is no active transaction")]
    NoActiveTransaction,

    #[error("transaction commit failed because the transaction has been marked for rollback only")]
    CommitFailedRollbackOnly,

    #[error("savepoints are not supported by this driver")]
    SavepointsNotSupported,

    #[error("may not alter the nested transaction with savepoints behavior while a transaction is open")]
    MayNotAlterNestWithSavepointsInTransaction,

    // -- DriverError ----------------------------------------------------
    #[error("an exception occurred in driver '{0}': {1}")]
    DriverException(String, String),

    #[error("an exception occurred in driver '{driver}' while executing '{sql}'{params}: {source}")]
    ExecuteException {
        driver: String,
        sql: String,
        params: String,
        #[source]
        source: sqlx::Error,
    },

    // -- PlatformError ----------------------------------------------------
    #[error("operation '{0}' is not supported by platform")]
    NotSupported(&'static str),

    #[error("invalid isolation level '{0:?}'")]
    InvalidIsolationLevel(crate::connection::IsolationLevel),

    #[error("LIMIT argument offset '{0}' is not valid")]
    InvalidOffset(i64),

    #[error("platform '{0}' does not support offset values in limit queries")]
    OffsetNotSupported(&'static str),

    #[error("unknown database type '{0}' requested")]
    UnknownColumnType(String),

    // -- StatementError ----------------------------------------------------
    #[error("value for positional parameter with index '{index}' not found in params array: {params}")]
    MissingPositionalParameter { index: usize, params: String },

    #[error("value for named parameter ':{name}' not found in params array: {params}")]
    MissingNamedParameter { name: String, params: String },

    // -- BuilderError ----------------------------------------------------
    #[error("the given alias '{0}' is not part of any FROM or JOIN clause table. The currently registered aliases are: {1}")]
    UnknownAlias(String, String),

    #[error("the given alias '{0}' is not unique in FROM and JOIN clause table. The currently registered aliases are: {1}")]
    NonUniqueAlias(String, String),

    // -- TypesError ----------------------------------------------------
    #[error("unknown column type '{0}' requested")]
    UnknownType(String),

    // -- misc / builder usage errors ----------------------------------------------------
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl Error {
    pub fn unknown_driver(name: &str, known: &[&str]) -> Self {
        let mut known = known.to_vec();
        known.sort_unstable();
        Error::UnknownDriver(name.to_string(), known.join(", "))
    }

    pub fn driver_exception(driver_name: &str, source: impl std::fmt::Display) -> Self {
        Error::DriverException(driver_name.to_string(), source.to_string())
    }

    pub fn execute_exception(
        driver_name: &str,
        source: sqlx::Error,
        sql: &str,
        params: &[String],
    ) -> Self {
        let params = if params.is_empty() {
            String::new()
        } else {
            format!(" with parameters [{}]", params.join(", "))
        };
        Error::ExecuteException {
            driver: driver_name.to_string(),
            sql: sql.to_string(),
            params,
            source,
        }
    }

    pub fn not_supported(op: &'static str) -> Self {
        Error::NotSupported(op)
    }

    pub fn offset_not_supported(platform_name: &'static str) -> Self {
        Error::OffsetNotSupported(platform_name)
    }

    pub fn unknown_column_type(ty: &str) -> Self {
        Error::UnknownColumnType(ty.to_string())
    }

    pub fn missing_positional_parameter(index: usize, params: &[String]) -> Self {
        Error::MissingPositionalParameter {
            index,
            params: format!("[{}]", params.join(", ")),
        }
    }

    pub fn missing_named_parameter(name: &str, params: &[String]) -> Self {
        Error::MissingNamedParameter {
            name: name.to_string(),
            params: format!("[{}]", params.join(", ")),
        }
    }

    pub fn unknown_alias(alias: &str, registered: &[String]) -> Self {
        Error::UnknownAlias(alias.to_string(), registered.join(", "))
    }

    pub fn non_unique_alias(alias: &str, registered: &[String]) -> Self {
        Error::NonUniqueAlias(alias.to_string(), registered.join(", "))
    }

    pub fn unknown_type(name: &str) -> Self {
        Error::UnknownType(name.to_string())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

/// A diagnostic, not an error: logged at `warn` level rather than raised.
/// Mirrors e.g. SQLite's lack of an exposed error-code channel.
pub fn not_implemented_warning(msg: &str) {
    log::warn!("{msg}");
}

pub type Result<T> = std::result::Result<T, Error>;
