//! Persistence core of the quiz application.
//! The store backends, the store selector and the use-case services live here.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod stats;
pub mod store;

pub use config::{
    load_config, BackendConfig, ConfigError, EmbeddedConfig, Environment, MariaDbConfig,
    QuizConfig, RelationalConfig,
};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::{now_epoch_ms, Answer, AnswerId, Question, QuestionId, QuizResult, Topic, TopicId};
pub use repo::embedded_repo::EmbeddedStore;
pub use repo::error::{EntityKind, PersistenceError, StoreError, StoreResult};
pub use repo::mariadb_repo::MariaDbStore;
pub use repo::quiz_repo::QuizRepository;
pub use repo::sqlite_repo::RelationalStore;
pub use service::{QuestionService, QuizResultService, ServiceError, TopicService, ValidationError};
pub use stats::{summarize_all, summarize_topic, Statistic, ALL_TOPICS_LABEL};
pub use store::{QuizStore, StoreSelector};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
