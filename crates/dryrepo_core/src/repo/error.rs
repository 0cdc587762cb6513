//! Repository error taxonomy.
//!
//! # Invariants
//! - A missing record is always `RepoError::NotFound`, whatever the store
//!   reports it as.
//! - Caller-provided closure errors never pass through this type.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Error returned by repository and store operations.
#[derive(Debug)]
pub enum RepoError {
    /// No record matched the predicate.
    NotFound { entity: &'static str },
    /// The backing store failed (connectivity, constraint, conflict).
    Persistence(DbError),
    /// Invalid predicate, option or call shape; raised before the store is touched.
    Configuration(String),
    /// A stored row could not be decoded into its record type.
    InvalidData(String),
    /// Caller-defined sentinel, typically produced by a not-found mapper.
    Domain(Box<dyn Error + Send + Sync + 'static>),
}

impl RepoError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Wraps a caller error as a domain sentinel.
    pub fn domain(err: impl Error + Send + Sync + 'static) -> Self {
        Self::Domain(Box::new(err))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Short machine-readable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Persistence(_) => "persistence",
            Self::Configuration(_) => "configuration",
            Self::InvalidData(_) => "invalid_data",
            Self::Domain(_) => "domain",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity } => write!(f, "{entity} not found"),
            Self::Persistence(err) => write!(f, "{err}"),
            Self::Configuration(message) => write!(f, "invalid repository usage: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Domain(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persistence(err) => Some(err),
            Self::Domain(err) => Some(err.as_ref()),
            Self::NotFound { .. } => None,
            Self::Configuration(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Persistence(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Self::NotFound { entity: "record" },
            other => Self::Persistence(DbError::Sqlite(other)),
        }
    }
}
