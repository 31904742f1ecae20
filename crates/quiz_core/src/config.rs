//! Application configuration and backend resolution.
//!
//! # Responsibility
//! - Load `quiz.toml` into [`QuizConfig`].
//! - Resolve symbolic environment and backend names into a closed
//!   [`BackendConfig`] variant.
//!
//! # Invariants
//! - A missing config file is not an error; callers use defaults.
//! - Unknown environment or backend names are errors, never silently mapped.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "quiz.toml";
const DEFAULT_FILE_PREFIX: &str = "quiz";
const DEFAULT_SQLITE_FILE: &str = "quiz.db";
const DEVELOPMENT_SQLITE_FILE: &str = "quiz_dev.db";
const TESTING_SQLITE_FILE: &str = "quiz_test.db";

/// Errors from loading or resolving configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    UnknownEnvironment(String),
    UnknownBackend(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "invalid config `{}`: {source}", path.display())
            }
            Self::UnknownEnvironment(name) => write!(
                f,
                "unknown environment `{name}`; expected development|production|testing|local"
            ),
            Self::UnknownBackend(name) => {
                write!(f, "unknown backend `{name}`; expected embedded|sqlite|mariadb")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::UnknownEnvironment(_) | Self::UnknownBackend(_) => None,
        }
    }
}

/// Named deployment profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Testing,
    Local,
}

impl Environment {
    /// Parses a profile name; accepts `dev`, `prod` and `test` aliases.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "testing" | "test" => Ok(Self::Testing),
            "local" => Ok(Self::Local),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }

    /// Backend used when the config names none.
    pub fn default_backend(self) -> BackendKind {
        match self {
            Self::Development | Self::Testing => BackendKind::Sqlite,
            Self::Production => BackendKind::MariaDb,
            Self::Local => BackendKind::Embedded,
        }
    }

    fn default_sqlite_file(self) -> &'static str {
        match self {
            Self::Development => DEVELOPMENT_SQLITE_FILE,
            Self::Testing => TESTING_SQLITE_FILE,
            Self::Production | Self::Local => DEFAULT_SQLITE_FILE,
        }
    }
}

/// Symbolic backend name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Embedded,
    Sqlite,
    MariaDb,
}

impl BackendKind {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "embedded" | "local" | "lokal" => Ok(Self::Embedded),
            "sqlite" => Ok(Self::Sqlite),
            "mariadb" => Ok(Self::MariaDb),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

/// Fully resolved backend selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Embedded(EmbeddedConfig),
    Relational(RelationalConfig),
}

/// Location of the embedded store's four collection files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddedConfig {
    pub dir: PathBuf,
    pub file_prefix: String,
}

impl Default for EmbeddedConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
        }
    }
}

impl EmbeddedConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    /// Path of the file holding collection `name`.
    pub fn collection_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}_{name}.json", self.file_prefix))
    }
}

/// Relational engine selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationalConfig {
    Sqlite { path: PathBuf },
    MariaDb(MariaDbConfig),
}

/// Connection settings for a MariaDB server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MariaDbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl Default for MariaDbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            database: "quiz_db".to_string(),
            user: "root".to_string(),
            password: String::new(),
        }
    }
}

impl Debug for MariaDbConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MariaDbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteSection {
    /// Database file; defaults per environment when absent.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: Option<String>,
    /// Absolute log directory; logging stays off when absent.
    pub dir: Option<PathBuf>,
}

/// Root of `quiz.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizConfig {
    pub environment: String,
    pub backend: Option<String>,
    pub embedded: EmbeddedConfig,
    pub sqlite: SqliteSection,
    pub mariadb: MariaDbConfig,
    pub logging: LoggingSection,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            environment: "local".to_string(),
            backend: None,
            embedded: EmbeddedConfig::default(),
            sqlite: SqliteSection::default(),
            mariadb: MariaDbConfig::default(),
            logging: LoggingSection::default(),
        }
    }
}

impl QuizConfig {
    /// Resolves the configured environment and backend.
    pub fn backend_config(&self) -> Result<BackendConfig, ConfigError> {
        self.resolve_backend(self.backend.as_deref(), &self.environment)
    }

    /// Resolves explicit names against this config's sections.
    ///
    /// `backend = None` takes the environment's default backend.
    pub fn resolve_backend(
        &self,
        backend: Option<&str>,
        environment: &str,
    ) -> Result<BackendConfig, ConfigError> {
        let environment = Environment::parse(environment)?;
        let kind = match backend {
            Some(name) => BackendKind::parse(name)?,
            None => environment.default_backend(),
        };

        Ok(match kind {
            BackendKind::Embedded => BackendConfig::Embedded(self.embedded.clone()),
            BackendKind::Sqlite => BackendConfig::Relational(RelationalConfig::Sqlite {
                path: self
                    .sqlite
                    .file
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(environment.default_sqlite_file())),
            }),
            BackendKind::MariaDb => {
                BackendConfig::Relational(RelationalConfig::MariaDb(self.mariadb.clone()))
            }
        })
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Loads configuration from `path` (or `quiz.toml`).
///
/// Returns `Ok(None)` when the file does not exist.
pub fn load_config(path: Option<&Path>) -> Result<Option<QuizConfig>, ConfigError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let config = parse_config(&contents).map_err(|source| ConfigError::Parse { path, source })?;
    Ok(Some(config))
}

/// Parses TOML text into a config, filling absent keys with defaults.
pub fn parse_config(contents: &str) -> Result<QuizConfig, toml::de::Error> {
    toml::from_str(contents)
}
