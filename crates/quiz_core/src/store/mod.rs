//! Backend selection and the closed store variant.
//!
//! # Responsibility
//! - Open the backend named by configuration.
//! - Fall back to the embedded store when the configured backend fails.
//!
//! # Invariants
//! - Backend kind is decided by matching `QuizStore`, never by type probing.
//! - Only a failed embedded fallback is reported to the caller.

use crate::config::{BackendConfig, EmbeddedConfig, QuizConfig, RelationalConfig};
use crate::model::{
    Answer, AnswerId, Question, QuestionId, QuizResult, Topic, TopicId,
};
use crate::repo::embedded_repo::EmbeddedStore;
use crate::repo::error::StoreResult;
use crate::repo::mariadb_repo::MariaDbStore;
use crate::repo::quiz_repo::QuizRepository;
use crate::repo::sqlite_repo::RelationalStore;
use crate::stats::Statistic;
use log::{info, warn};

/// Store instance chosen at startup.
pub enum QuizStore {
    Embedded(EmbeddedStore),
    Relational(RelationalStore),
    MariaDb(MariaDbStore),
}

impl QuizStore {
    /// Opens exactly the backend described by `config`, without fallback.
    pub fn open(config: &BackendConfig) -> StoreResult<Self> {
        match config {
            BackendConfig::Embedded(embedded) => {
                Ok(Self::Embedded(EmbeddedStore::open(embedded)?))
            }
            BackendConfig::Relational(RelationalConfig::Sqlite { path }) => {
                Ok(Self::Relational(RelationalStore::open(path)?))
            }
            BackendConfig::Relational(RelationalConfig::MariaDb(settings)) => {
                Ok(Self::MariaDb(MariaDbStore::open(settings)?))
            }
        }
    }

    /// Short name for display and logs.
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Embedded(_) => "embedded",
            Self::Relational(_) => "sqlite",
            Self::MariaDb(_) => "mariadb",
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded(_))
    }

    fn repo(&self) -> &dyn QuizRepository {
        match self {
            Self::Embedded(store) => store,
            Self::Relational(store) => store,
            Self::MariaDb(store) => store,
        }
    }
}

impl QuizRepository for QuizStore {
    fn list_topics(&self) -> StoreResult<Vec<Topic>> {
        self.repo().list_topics()
    }

    fn find_topic(&self, id: TopicId) -> StoreResult<Option<Topic>> {
        self.repo().find_topic(id)
    }

    fn find_topic_by_title(&self, title: &str) -> StoreResult<Option<Topic>> {
        self.repo().find_topic_by_title(title)
    }

    fn save_topic(&self, topic: &Topic) -> StoreResult<Topic> {
        self.repo().save_topic(topic)
    }

    fn delete_topic(&self, id: TopicId) -> StoreResult<()> {
        self.repo().delete_topic(id)
    }

    fn find_questions_by_topic(&self, topic_id: TopicId) -> StoreResult<Vec<Question>> {
        self.repo().find_questions_by_topic(topic_id)
    }

    fn find_question(&self, id: QuestionId) -> StoreResult<Option<Question>> {
        self.repo().find_question(id)
    }

    fn find_question_by_title(
        &self,
        topic_id: TopicId,
        title: &str,
    ) -> StoreResult<Option<Question>> {
        self.repo().find_question_by_title(topic_id, title)
    }

    fn save_question(&self, question: &Question) -> StoreResult<Question> {
        self.repo().save_question(question)
    }

    fn delete_question(&self, id: QuestionId) -> StoreResult<()> {
        self.repo().delete_question(id)
    }

    fn find_answers_by_question(&self, question_id: QuestionId) -> StoreResult<Vec<Answer>> {
        self.repo().find_answers_by_question(question_id)
    }

    fn save_answer(&self, question_id: QuestionId, answer: &Answer) -> StoreResult<Answer> {
        self.repo().save_answer(question_id, answer)
    }

    fn delete_answer(&self, id: AnswerId) -> StoreResult<()> {
        self.repo().delete_answer(id)
    }

    fn append_result(&self, result: &QuizResult) -> StoreResult<QuizResult> {
        self.repo().append_result(result)
    }

    fn find_results_by_topic(&self, topic_id: TopicId) -> StoreResult<Vec<QuizResult>> {
        self.repo().find_results_by_topic(topic_id)
    }

    fn find_results_by_question(&self, question_id: QuestionId) -> StoreResult<Vec<QuizResult>> {
        self.repo().find_results_by_question(question_id)
    }

    fn statistics_by_topic(&self, topic_id: TopicId) -> StoreResult<Vec<Statistic>> {
        self.repo().statistics_by_topic(topic_id)
    }

    fn statistics_all(&self) -> StoreResult<Vec<Statistic>> {
        self.repo().statistics_all()
    }
}

/// Chooses and opens a store from configuration.
#[derive(Debug, Clone, Default)]
pub struct StoreSelector {
    config: QuizConfig,
}

impl StoreSelector {
    pub fn new(config: QuizConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QuizConfig {
        &self.config
    }

    /// Opens the backend named by the loaded configuration.
    pub fn open(&self) -> StoreResult<QuizStore> {
        self.resolve(self.config.backend.as_deref(), &self.config.environment)
    }

    /// Opens `backend` for `environment`, falling back to the embedded store.
    ///
    /// `backend = None` uses the environment's default backend. Unknown names
    /// and open failures of the chosen backend both trigger the fallback.
    ///
    /// # Errors
    /// - Whatever the embedded fallback fails with.
    pub fn resolve(&self, backend: Option<&str>, environment: &str) -> StoreResult<QuizStore> {
        let selected = match self.config.resolve_backend(backend, environment) {
            Ok(selected) => selected,
            Err(err) => {
                warn!(
                    "event=backend_fallback module=store status=error environment={} backend={} error={}",
                    environment,
                    backend.unwrap_or("default"),
                    err
                );
                return self.open_fallback();
            }
        };

        match QuizStore::open(&selected) {
            Ok(store) => {
                info!(
                    "event=backend_select module=store status=ok environment={} backend={}",
                    environment,
                    store.backend_name()
                );
                Ok(store)
            }
            Err(err) if matches!(selected, BackendConfig::Embedded(_)) => Err(err),
            Err(err) => {
                warn!(
                    "event=backend_fallback module=store status=error environment={} error_code={} error={}",
                    environment,
                    err.code(),
                    err
                );
                self.open_fallback()
            }
        }
    }

    fn open_fallback(&self) -> StoreResult<QuizStore> {
        let store = open_embedded(&self.config.embedded)?;
        info!(
            "event=backend_select module=store status=ok backend=embedded fallback=true dir={}",
            self.config.embedded.dir.display()
        );
        Ok(store)
    }
}

fn open_embedded(config: &EmbeddedConfig) -> StoreResult<QuizStore> {
    Ok(QuizStore::Embedded(EmbeddedStore::open(config)?))
}
