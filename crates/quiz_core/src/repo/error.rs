//! Error taxonomy shared by every store backend.
//!
//! Backend-specific failures (I/O, JSON, SQLite, MariaDB) are wrapped here before they
//! cross the repository contract.

use crate::db::SchemaError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

pub type StoreResult<T> = Result<T, StoreError>;

/// Entity kind named in `NotFound` and `DuplicateTitle` errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Topic,
    Question,
    Answer,
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Topic => f.write_str("topic"),
            Self::Question => f.write_str("question"),
            Self::Answer => f.write_str("answer"),
        }
    }
}

/// Error returned by repository operations.
#[derive(Debug)]
pub enum StoreError {
    /// Referenced identifier does not exist.
    NotFound { entity: EntityKind, id: i64 },
    /// Create or rename would break title uniqueness.
    DuplicateTitle { entity: EntityKind, title: String },
    /// Write or read against the backing medium failed.
    Persistence(PersistenceError),
    /// Relational schema could not be created.
    Schema(SchemaError),
    /// Persisted state cannot be mapped back to records.
    InvalidData(String),
    /// Configured backend cannot be reached.
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(entity: EntityKind, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn duplicate_title(entity: EntityKind, title: impl Into<String>) -> Self {
        Self::DuplicateTitle {
            entity,
            title: title.into(),
        }
    }

    /// Stable short code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::DuplicateTitle { .. } => "duplicate_title",
            Self::Persistence(_) => "persistence",
            Self::Schema(_) => "schema",
            Self::InvalidData(_) => "invalid_data",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::DuplicateTitle { entity, title } => {
                write!(f, "{entity} title already in use: `{title}`")
            }
            Self::Persistence(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted quiz data: {message}"),
            Self::Unavailable(message) => write!(f, "store backend unavailable: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persistence(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::NotFound { .. }
            | Self::DuplicateTitle { .. }
            | Self::InvalidData(_)
            | Self::Unavailable(_) => None,
        }
    }
}

impl From<PersistenceError> for StoreError {
    fn from(value: PersistenceError) -> Self {
        Self::Persistence(value)
    }
}

impl From<SchemaError> for StoreError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Persistence(PersistenceError::Sqlite(value))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        Self::Persistence(PersistenceError::MariaDb(value))
    }
}

/// Failure of the backing medium.
#[derive(Debug)]
pub enum PersistenceError {
    /// Reading or writing a collection file failed.
    Io { path: PathBuf, source: io::Error },
    /// A collection file could not be encoded or decoded.
    Serialization {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// A SQLite statement failed.
    Sqlite(rusqlite::Error),
    /// A MariaDB query or connection failed.
    MariaDb(sqlx::Error),
    /// A writer panicked while holding the store lock.
    LockPoisoned,
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "i/o error on `{}`: {source}", path.display()),
            Self::Serialization { path, source } => {
                write!(f, "cannot encode or decode `{}`: {source}", path.display())
            }
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::MariaDb(err) => write!(f, "{err}"),
            Self::LockPoisoned => f.write_str("store lock poisoned by a panicked writer"),
        }
    }
}

impl Error for PersistenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialization { source, .. } => Some(source),
            Self::Sqlite(err) => Some(err),
            Self::MariaDb(err) => Some(err),
            Self::LockPoisoned => None,
        }
    }
}
