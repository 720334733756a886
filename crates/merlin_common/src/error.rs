//! Error types shared by the SQL frontend and both planners.
//!
//! Every error carries a stable display prefix (`parse error: `,
//! `bind error: `, `planning error: `, `catalog error: `) so that
//! callers matching on rendered messages get a predictable shape. The
//! planners additionally define their own message prefixes *inside*
//! the planning variant for rejection classes they own; those are
//! matched through predicate functions exported by the planner crates,
//! never by repeating the literal text elsewhere.

use thiserror::Error;

/// Result alias used throughout the frontend and planner crates.
pub type SqlResult<T> = Result<T, SqlError>;

/// A failure while parsing, binding, or planning a statement.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SqlError {
    /// The statement text is not valid SQL.
    #[error("parse error: {0}")]
    Parse(String),

    /// The statement parsed but does not resolve against the catalog
    /// (unknown table/column, unsupported construct, type mismatch).
    #[error("bind error: {0}")]
    Bind(String),

    /// The statement bound but no plan could be produced.
    #[error("planning error: {0}")]
    Planning(String),

    /// A schema definition could not be applied to the catalog.
    #[error("catalog error: {0}")]
    Catalog(String),
}

/// Coarse classification of a [`SqlError`], used where callers only
/// care which stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Bind,
    Planning,
    Catalog,
}

impl SqlError {
    pub fn parse(msg: impl Into<String>) -> Self {
        SqlError::Parse(msg.into())
    }

    pub fn bind(msg: impl Into<String>) -> Self {
        SqlError::Bind(msg.into())
    }

    pub fn planning(msg: impl Into<String>) -> Self {
        SqlError::Planning(msg.into())
    }

    pub fn catalog(msg: impl Into<String>) -> Self {
        SqlError::Catalog(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SqlError::Parse(_) => ErrorKind::Parse,
            SqlError::Bind(_) => ErrorKind::Bind,
            SqlError::Planning(_) => ErrorKind::Planning,
            SqlError::Catalog(_) => ErrorKind::Catalog,
        }
    }

    /// The message body without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            SqlError::Parse(m)
            | SqlError::Bind(m)
            | SqlError::Planning(m)
            | SqlError::Catalog(m) => m,
        }
    }
}
