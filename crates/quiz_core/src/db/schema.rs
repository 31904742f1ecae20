//! Quiz schema definitions and idempotent creation.
//!
//! # Responsibility
//! - Own the DDL for `Topics`, `Questions`, `Answers` and `QuizResults`.
//! - Pick column types per engine dialect so callers never do.
//!
//! # Invariants
//! - Every statement is `IF NOT EXISTS`; running the schema twice is a no-op.
//! - Child tables cascade deletes from their parents.
//! - MariaDB tables are InnoDB with a case-insensitive collation, so title
//!   comparison matches SQLite `NOCASE` for ASCII titles.

use super::{DbResult, SchemaError};
use log::info;
use rusqlite::Connection;
use sqlx::{Executor, MySqlPool};
use std::fmt::{Display, Formatter};

/// Schema version mirrored into `PRAGMA user_version`.
pub const SCHEMA_VERSION: u32 = 1;

/// Relational engine flavour used to render DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDialect {
    /// Auto-increment integer keys and unbounded `TEXT` columns.
    Sqlite,
    /// `BIGINT AUTO_INCREMENT` keys and `VARCHAR(255)` title columns.
    MariaDb,
}

impl Display for SqlDialect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite => f.write_str("sqlite"),
            Self::MariaDb => f.write_str("mariadb"),
        }
    }
}

/// One named DDL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaStatement {
    pub name: &'static str,
    pub sql: &'static str,
}

const SQLITE_SCHEMA: &[SchemaStatement] = &[
    SchemaStatement {
        name: "topics_table",
        sql: "CREATE TABLE IF NOT EXISTS Topics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT ''
        );",
    },
    SchemaStatement {
        name: "topics_title_index",
        sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_topics_title
            ON Topics (title COLLATE NOCASE);",
    },
    SchemaStatement {
        name: "questions_table",
        sql: "CREATE TABLE IF NOT EXISTS Questions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            topic_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            FOREIGN KEY (topic_id) REFERENCES Topics (id) ON DELETE CASCADE
        );",
    },
    SchemaStatement {
        name: "questions_title_index",
        sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_questions_topic_title
            ON Questions (topic_id, title COLLATE NOCASE);",
    },
    SchemaStatement {
        name: "answers_table",
        sql: "CREATE TABLE IF NOT EXISTS Answers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            question_id INTEGER NOT NULL,
            text TEXT NOT NULL,
            is_correct INTEGER NOT NULL,
            FOREIGN KEY (question_id) REFERENCES Questions (id) ON DELETE CASCADE
        );",
    },
    SchemaStatement {
        name: "answers_question_index",
        sql: "CREATE INDEX IF NOT EXISTS idx_answers_question ON Answers (question_id);",
    },
    SchemaStatement {
        name: "quiz_results_table",
        sql: "CREATE TABLE IF NOT EXISTS QuizResults (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            topic_id INTEGER NOT NULL,
            question_id INTEGER NOT NULL,
            is_correct INTEGER NOT NULL,
            answer_revealed INTEGER NOT NULL,
            response_time_secs INTEGER NOT NULL,
            answered_at INTEGER NOT NULL,
            score INTEGER NOT NULL,
            FOREIGN KEY (topic_id) REFERENCES Topics (id) ON DELETE CASCADE,
            FOREIGN KEY (question_id) REFERENCES Questions (id) ON DELETE CASCADE
        );",
    },
    SchemaStatement {
        name: "quiz_results_topic_index",
        sql: "CREATE INDEX IF NOT EXISTS idx_quiz_results_topic ON QuizResults (topic_id);",
    },
    SchemaStatement {
        name: "quiz_results_question_index",
        sql: "CREATE INDEX IF NOT EXISTS idx_quiz_results_question ON QuizResults (question_id);",
    },
];

const MARIADB_SCHEMA: &[SchemaStatement] = &[
    SchemaStatement {
        name: "topics_table",
        sql: "CREATE TABLE IF NOT EXISTS Topics (
            id BIGINT PRIMARY KEY AUTO_INCREMENT,
            title VARCHAR(255) NOT NULL,
            description TEXT NOT NULL
        ) ENGINE = InnoDB DEFAULT CHARSET = utf8mb4 COLLATE = utf8mb4_general_ci;",
    },
    SchemaStatement {
        name: "topics_title_index",
        sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_topics_title ON Topics (title);",
    },
    SchemaStatement {
        name: "questions_table",
        sql: "CREATE TABLE IF NOT EXISTS Questions (
            id BIGINT PRIMARY KEY AUTO_INCREMENT,
            topic_id BIGINT NOT NULL,
            title VARCHAR(255) NOT NULL,
            body TEXT NOT NULL,
            FOREIGN KEY (topic_id) REFERENCES Topics (id) ON DELETE CASCADE
        ) ENGINE = InnoDB DEFAULT CHARSET = utf8mb4 COLLATE = utf8mb4_general_ci;",
    },
    SchemaStatement {
        name: "questions_title_index",
        sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_questions_topic_title
            ON Questions (topic_id, title);",
    },
    SchemaStatement {
        name: "answers_table",
        sql: "CREATE TABLE IF NOT EXISTS Answers (
            id BIGINT PRIMARY KEY AUTO_INCREMENT,
            question_id BIGINT NOT NULL,
            text VARCHAR(255) NOT NULL,
            is_correct BOOLEAN NOT NULL,
            FOREIGN KEY (question_id) REFERENCES Questions (id) ON DELETE CASCADE
        ) ENGINE = InnoDB DEFAULT CHARSET = utf8mb4 COLLATE = utf8mb4_general_ci;",
    },
    SchemaStatement {
        name: "quiz_results_table",
        sql: "CREATE TABLE IF NOT EXISTS QuizResults (
            id BIGINT PRIMARY KEY AUTO_INCREMENT,
            topic_id BIGINT NOT NULL,
            question_id BIGINT NOT NULL,
            is_correct BOOLEAN NOT NULL,
            answer_revealed BOOLEAN NOT NULL,
            response_time_secs INT NOT NULL,
            answered_at BIGINT NOT NULL,
            score INT NOT NULL,
            FOREIGN KEY (topic_id) REFERENCES Topics (id) ON DELETE CASCADE,
            FOREIGN KEY (question_id) REFERENCES Questions (id) ON DELETE CASCADE
        ) ENGINE = InnoDB DEFAULT CHARSET = utf8mb4 COLLATE = utf8mb4_general_ci;",
    },
];

/// Returns the ordered DDL for `dialect`.
pub fn schema_statements(dialect: SqlDialect) -> &'static [SchemaStatement] {
    match dialect {
        SqlDialect::Sqlite => SQLITE_SCHEMA,
        SqlDialect::MariaDb => MARIADB_SCHEMA,
    }
}

/// Creates all quiz tables and indexes inside one transaction.
///
/// # Errors
/// - `UnsupportedVersion` when the database was created by a newer build.
/// - `UnsupportedDialect` for anything but the SQLite dialect.
/// - `Statement` naming the first DDL statement that failed.
pub fn initialize_schema(conn: &mut Connection, dialect: SqlDialect) -> DbResult<()> {
    if dialect != SqlDialect::Sqlite {
        return Err(SchemaError::UnsupportedDialect(dialect));
    }

    let current_version = current_user_version(conn)?;
    if current_version > SCHEMA_VERSION {
        return Err(SchemaError::UnsupportedVersion {
            db_version: current_version,
            latest_supported: SCHEMA_VERSION,
        });
    }

    let tx = conn.transaction()?;
    for statement in schema_statements(dialect) {
        tx.execute_batch(statement.sql)
            .map_err(|source| SchemaError::Statement {
                name: statement.name,
                source: Box::new(source),
            })?;
    }
    tx.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
    tx.commit()?;

    info!(
        "event=schema_init module=db status=ok dialect={dialect} previous_version={current_version} version={SCHEMA_VERSION}"
    );
    Ok(())
}

/// Creates all quiz tables and indexes on a MariaDB server.
///
/// MariaDB commits each DDL statement on its own, so statements run one by
/// one; a rerun after a partial failure completes the schema.
///
/// # Errors
/// - `Statement` naming the first DDL statement that failed.
pub async fn initialize_mariadb_schema(pool: &MySqlPool) -> DbResult<()> {
    for statement in schema_statements(SqlDialect::MariaDb) {
        pool.execute(statement.sql)
            .await
            .map_err(|source| SchemaError::Statement {
                name: statement.name,
                source: Box::new(source),
            })?;
    }

    info!(
        "event=schema_init module=db status=ok dialect={} statements={}",
        SqlDialect::MariaDb,
        MARIADB_SCHEMA.len()
    );
    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
