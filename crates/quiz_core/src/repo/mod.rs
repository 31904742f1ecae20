//! Repository contract and its store backends.
//!
//! # Responsibility
//! - Define the backend-agnostic quiz storage contract.
//! - Provide the file-persisted embedded store and the relational stores on
//!   SQLite and MariaDB.
//!
//! # Invariants
//! - Backends honor identical uniqueness, ordering and cascade semantics.
//! - Backend-internal errors never cross the contract unwrapped.

pub mod embedded_repo;
pub mod error;
pub mod mariadb_repo;
pub mod quiz_repo;
pub mod sqlite_repo;
