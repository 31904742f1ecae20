//! Relational bootstrap: connection opening and schema management.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the relational store.
//! - Create the quiz schema idempotently in the configured dialect, on a
//!   SQLite connection or a MariaDB pool.
//!
//! # Invariants
//! - SQLite schema version is tracked via `PRAGMA user_version`.
//! - No quiz data is read or written before the schema is in place.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod open;
pub mod schema;

pub use open::{bootstrap_connection, open_db, open_db_in_memory};
pub use schema::{
    initialize_mariadb_schema, initialize_schema, schema_statements, SqlDialect, SCHEMA_VERSION,
};

pub type DbResult<T> = Result<T, SchemaError>;

/// Failure while opening a relational connection or creating its schema.
#[derive(Debug)]
pub enum SchemaError {
    /// Connection open or pragma setup failed.
    Sqlite(rusqlite::Error),
    /// One named DDL statement failed.
    Statement {
        name: &'static str,
        source: Box<dyn Error + Send + Sync>,
    },
    /// The database was created by a newer build.
    UnsupportedVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// This connection type cannot execute the dialect.
    UnsupportedDialect(SqlDialect),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Statement { name, source } => {
                write!(f, "schema statement `{name}` failed: {source}")
            }
            Self::UnsupportedVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::UnsupportedDialect(dialect) => {
                write!(f, "a sqlite connection cannot execute the {dialect} dialect")
            }
        }
    }
}

impl Error for SchemaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Statement { source, .. } => Some(source.as_ref()),
            Self::UnsupportedVersion { .. } => None,
            Self::UnsupportedDialect(_) => None,
        }
    }
}

impl From<rusqlite::Error> for SchemaError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
