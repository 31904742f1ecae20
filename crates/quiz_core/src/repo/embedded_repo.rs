//! File-persisted embedded quiz store.
//!
//! # Responsibility
//! - Keep topics, questions, answers and results in memory.
//! - Rewrite the full affected collection file after every mutation.
//!   Each rewrite goes to a sibling temp file that is renamed over the target.
//!
//! # Invariants
//! - One store-wide `RwLock` guards all four collections, so cascades are
//!   atomic for readers.
//! - Per-kind id counters start at the highest persisted id and only grow.
//! - A failed file write is reported, but the in-memory mutation stays
//!   applied.
//! - A missing collection file loads as an empty collection.
//! - An interrupted write leaves the previous file content in place.

use crate::config::EmbeddedConfig;
use crate::model::{
    Answer, AnswerId, Question, QuestionId, QuizResult, Topic, TopicId,
};
use crate::repo::error::{EntityKind, PersistenceError, StoreError, StoreResult};
use crate::repo::quiz_repo::{
    compare_results_newest_first, compare_titles, log_failed_mutation, titles_match,
    QuizRepository,
};
use crate::stats::Statistic;
use log::{error, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tempfile::NamedTempFile;

const MODULE: &str = "embedded";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TopicRow {
    id: TopicId,
    title: String,
    description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct QuestionRow {
    id: QuestionId,
    topic_id: TopicId,
    title: String,
    body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AnswerRow {
    id: AnswerId,
    question_id: QuestionId,
    text: String,
    is_correct: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collection {
    Topics,
    Questions,
    Answers,
    Results,
}

impl Collection {
    const ALL: [Collection; 4] = [
        Collection::Topics,
        Collection::Questions,
        Collection::Answers,
        Collection::Results,
    ];

    fn file_stem(self) -> &'static str {
        match self {
            Self::Topics => "topics",
            Self::Questions => "questions",
            Self::Answers => "answers",
            Self::Results => "results",
        }
    }
}

#[derive(Debug, Clone)]
struct CollectionFiles {
    topics: PathBuf,
    questions: PathBuf,
    answers: PathBuf,
    results: PathBuf,
}

impl CollectionFiles {
    fn new(config: &EmbeddedConfig) -> Self {
        Self {
            topics: config.collection_path(Collection::Topics.file_stem()),
            questions: config.collection_path(Collection::Questions.file_stem()),
            answers: config.collection_path(Collection::Answers.file_stem()),
            results: config.collection_path(Collection::Results.file_stem()),
        }
    }

    fn path(&self, collection: Collection) -> &Path {
        match collection {
            Collection::Topics => &self.topics,
            Collection::Questions => &self.questions,
            Collection::Answers => &self.answers,
            Collection::Results => &self.results,
        }
    }
}

/// Last id handed out per entity kind.
#[derive(Debug, Default)]
struct IdCounters {
    topic: i64,
    question: i64,
    answer: i64,
    result: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Default)]
struct EmbeddedState {
    topics: Vec<TopicRow>,
    questions: Vec<QuestionRow>,
    answers: Vec<AnswerRow>,
    results: Vec<QuizResult>,
    counters: IdCounters,
}

impl EmbeddedState {
    fn seed_counters(&mut self) {
        self.counters = IdCounters {
            topic: self.topics.iter().map(|row| row.id).max().unwrap_or(0),
            question: self.questions.iter().map(|row| row.id).max().unwrap_or(0),
            answer: self.answers.iter().map(|row| row.id).max().unwrap_or(0),
            result: self.results.iter().map(|row| row.id).max().unwrap_or(0),
        };
    }

    fn topic_row(&self, id: TopicId) -> Option<&TopicRow> {
        self.topics.iter().find(|row| row.id == id)
    }

    fn question_row(&self, id: QuestionId) -> Option<&QuestionRow> {
        self.questions.iter().find(|row| row.id == id)
    }

    fn topic_view(&self, row: &TopicRow) -> Topic {
        let question_count = self
            .questions
            .iter()
            .filter(|question| question.topic_id == row.id)
            .count();
        Topic {
            id: row.id,
            title: row.title.clone(),
            description: row.description.clone(),
            question_count: u32::try_from(question_count).unwrap_or(u32::MAX),
        }
    }

    fn answers_of(&self, question_id: QuestionId) -> Vec<Answer> {
        let mut answers: Vec<Answer> = self
            .answers
            .iter()
            .filter(|row| row.question_id == question_id)
            .map(|row| Answer {
                id: row.id,
                text: row.text.clone(),
                is_correct: row.is_correct,
            })
            .collect();
        answers.sort_by_key(|answer| answer.id);
        answers
    }

    fn question_view(&self, row: &QuestionRow) -> Question {
        Question {
            id: row.id,
            topic_id: row.topic_id,
            title: row.title.clone(),
            body: row.body.clone(),
            answers: self.answers_of(row.id),
        }
    }

    fn questions_of(&self, topic_id: TopicId) -> Vec<Question> {
        let mut rows: Vec<&QuestionRow> = self
            .questions
            .iter()
            .filter(|row| row.topic_id == topic_id)
            .collect();
        rows.sort_by(|left, right| {
            compare_titles(&left.title, &right.title).then(left.id.cmp(&right.id))
        });
        rows.into_iter().map(|row| self.question_view(row)).collect()
    }

    fn sorted_topics(&self) -> Vec<Topic> {
        let mut rows: Vec<&TopicRow> = self.topics.iter().collect();
        rows.sort_by(|left, right| {
            compare_titles(&left.title, &right.title).then(left.id.cmp(&right.id))
        });
        rows.into_iter().map(|row| self.topic_view(row)).collect()
    }

    fn results_matching(&self, keep: impl Fn(&QuizResult) -> bool) -> Vec<QuizResult> {
        let mut results: Vec<QuizResult> =
            self.results.iter().filter(|row| keep(*row)).cloned().collect();
        results.sort_by(compare_results_newest_first);
        results
    }

    /// Drops answers of `question_ids`, then the questions, then their results.
    fn remove_questions(&mut self, question_ids: &HashSet<QuestionId>) {
        self.answers
            .retain(|row| !question_ids.contains(&row.question_id));
        self.questions.retain(|row| !question_ids.contains(&row.id));
        self.results
            .retain(|row| !question_ids.contains(&row.question_id));
    }

    fn replace_answers(&mut self, question_id: QuestionId, answers: &[Answer]) {
        self.answers.retain(|row| row.question_id != question_id);
        for answer in answers {
            let id = next_id(&mut self.counters.answer);
            self.answers.push(AnswerRow {
                id,
                question_id,
                text: answer.text.clone(),
                is_correct: answer.is_correct,
            });
        }
    }

    fn statistics_of(&self, topic: &Topic) -> Vec<Statistic> {
        self.questions_of(topic.id)
            .iter()
            .map(|question| {
                let results = self.results_matching(|row| row.question_id == question.id);
                Statistic::for_question(topic, question).with_results(&results)
            })
            .collect()
    }
}

/// In-process store persisted as four JSON collection files.
///
/// Safe to share across threads; readers run concurrently and writers are
/// exclusive with everything else.
#[derive(Debug)]
pub struct EmbeddedStore {
    files: CollectionFiles,
    state: RwLock<EmbeddedState>,
}

impl EmbeddedStore {
    /// Loads all collections below `config.dir`, creating the directory.
    ///
    /// # Errors
    /// - `Persistence` when the directory cannot be created or a file is
    ///   unreadable or not valid JSON.
    pub fn open(config: &EmbeddedConfig) -> StoreResult<Self> {
        fs::create_dir_all(&config.dir).map_err(|source| PersistenceError::Io {
            path: config.dir.clone(),
            source,
        })?;

        let files = CollectionFiles::new(config);
        let mut state = EmbeddedState {
            topics: read_collection(files.path(Collection::Topics))?,
            questions: read_collection(files.path(Collection::Questions))?,
            answers: read_collection(files.path(Collection::Answers))?,
            results: read_collection(files.path(Collection::Results))?,
            counters: IdCounters::default(),
        };
        state.seed_counters();

        info!(
            "event=store_open module=embedded status=ok dir={} topics={} questions={} answers={} results={}",
            config.dir.display(),
            state.topics.len(),
            state.questions.len(),
            state.answers.len(),
            state.results.len()
        );

        Ok(Self {
            files,
            state: RwLock::new(state),
        })
    }

    fn read_state(&self) -> StoreResult<RwLockReadGuard<'_, EmbeddedState>> {
        self.state
            .read()
            .map_err(|_| StoreError::Persistence(PersistenceError::LockPoisoned))
    }

    fn write_state(&self) -> StoreResult<RwLockWriteGuard<'_, EmbeddedState>> {
        self.state
            .write()
            .map_err(|_| StoreError::Persistence(PersistenceError::LockPoisoned))
    }

    /// Rewrites each listed collection file from `state`.
    fn persist(&self, state: &EmbeddedState, collections: &[Collection]) -> StoreResult<()> {
        for collection in collections {
            let path = self.files.path(*collection);
            let written = match collection {
                Collection::Topics => write_collection(path, &state.topics),
                Collection::Questions => write_collection(path, &state.questions),
                Collection::Answers => write_collection(path, &state.answers),
                Collection::Results => write_collection(path, &state.results),
            };
            if let Err(err) = written {
                error!(
                    "event=store_persist module=embedded status=error collection={} error={}",
                    collection.file_stem(),
                    err
                );
                return Err(err.into());
            }
        }
        Ok(())
    }

    fn put_topic(&self, topic: &Topic) -> StoreResult<Topic> {
        let mut state = self.write_state()?;

        let conflict = state
            .topics
            .iter()
            .any(|row| row.id != topic.id && titles_match(&row.title, &topic.title));
        if conflict {
            return Err(StoreError::duplicate_title(EntityKind::Topic, &topic.title));
        }

        let id = if topic.is_new() {
            let id = next_id(&mut state.counters.topic);
            state.topics.push(TopicRow {
                id,
                title: topic.title.clone(),
                description: topic.description.clone(),
            });
            id
        } else {
            let row = state
                .topics
                .iter_mut()
                .find(|row| row.id == topic.id)
                .ok_or_else(|| StoreError::not_found(EntityKind::Topic, topic.id))?;
            row.title = topic.title.clone();
            row.description = topic.description.clone();
            topic.id
        };

        self.persist(&state, &[Collection::Topics])?;
        let saved = state
            .topic_row(id)
            .map(|row| state.topic_view(row))
            .ok_or_else(|| StoreError::not_found(EntityKind::Topic, id))?;
        Ok(saved)
    }

    fn remove_topic(&self, id: TopicId) -> StoreResult<()> {
        let mut state = self.write_state()?;
        if state.topic_row(id).is_none() {
            return Err(StoreError::not_found(EntityKind::Topic, id));
        }

        let question_ids: HashSet<QuestionId> = state
            .questions
            .iter()
            .filter(|row| row.topic_id == id)
            .map(|row| row.id)
            .collect();
        state.remove_questions(&question_ids);
        state.results.retain(|row| row.topic_id != id);
        state.topics.retain(|row| row.id != id);

        info!(
            "event=topic_delete module=embedded status=ok topic_id={} questions_removed={}",
            id,
            question_ids.len()
        );
        self.persist(&state, &Collection::ALL)
    }

    fn put_question(&self, question: &Question) -> StoreResult<Question> {
        let mut state = self.write_state()?;
        if state.topic_row(question.topic_id).is_none() {
            return Err(StoreError::not_found(EntityKind::Topic, question.topic_id));
        }

        let conflict = state.questions.iter().any(|row| {
            row.id != question.id
                && row.topic_id == question.topic_id
                && titles_match(&row.title, &question.title)
        });
        if conflict {
            return Err(StoreError::duplicate_title(
                EntityKind::Question,
                &question.title,
            ));
        }

        let id = if question.is_new() {
            let id = next_id(&mut state.counters.question);
            state.questions.push(QuestionRow {
                id,
                topic_id: question.topic_id,
                title: question.title.clone(),
                body: question.body.clone(),
            });
            id
        } else {
            let row = state
                .questions
                .iter_mut()
                .find(|row| row.id == question.id)
                .ok_or_else(|| StoreError::not_found(EntityKind::Question, question.id))?;
            row.topic_id = question.topic_id;
            row.title = question.title.clone();
            row.body = question.body.clone();
            question.id
        };
        state.replace_answers(id, &question.answers);

        self.persist(&state, &[Collection::Questions, Collection::Answers])?;
        let saved = state
            .question_row(id)
            .map(|row| state.question_view(row))
            .ok_or_else(|| StoreError::not_found(EntityKind::Question, id))?;
        Ok(saved)
    }

    fn remove_question(&self, id: QuestionId) -> StoreResult<()> {
        let mut state = self.write_state()?;
        if state.question_row(id).is_none() {
            return Err(StoreError::not_found(EntityKind::Question, id));
        }

        state.remove_questions(&HashSet::from([id]));
        self.persist(
            &state,
            &[
                Collection::Questions,
                Collection::Answers,
                Collection::Results,
            ],
        )
    }

    fn put_answer(&self, question_id: QuestionId, answer: &Answer) -> StoreResult<Answer> {
        let mut state = self.write_state()?;
        if state.question_row(question_id).is_none() {
            return Err(StoreError::not_found(EntityKind::Question, question_id));
        }

        let saved = if answer.is_new() {
            let id = next_id(&mut state.counters.answer);
            state.answers.push(AnswerRow {
                id,
                question_id,
                text: answer.text.clone(),
                is_correct: answer.is_correct,
            });
            Answer {
                id,
                text: answer.text.clone(),
                is_correct: answer.is_correct,
            }
        } else {
            let row = state
                .answers
                .iter_mut()
                .find(|row| row.id == answer.id && row.question_id == question_id)
                .ok_or_else(|| StoreError::not_found(EntityKind::Answer, answer.id))?;
            row.text = answer.text.clone();
            row.is_correct = answer.is_correct;
            answer.clone()
        };

        self.persist(&state, &[Collection::Answers])?;
        Ok(saved)
    }

    fn remove_answer(&self, id: AnswerId) -> StoreResult<()> {
        let mut state = self.write_state()?;
        let before = state.answers.len();
        state.answers.retain(|row| row.id != id);
        if state.answers.len() == before {
            return Err(StoreError::not_found(EntityKind::Answer, id));
        }
        self.persist(&state, &[Collection::Answers])
    }

    fn push_result(&self, result: &QuizResult) -> StoreResult<QuizResult> {
        let mut state = self.write_state()?;
        if state.topic_row(result.topic_id).is_none() {
            return Err(StoreError::not_found(EntityKind::Topic, result.topic_id));
        }
        if state.question_row(result.question_id).is_none() {
            return Err(StoreError::not_found(
                EntityKind::Question,
                result.question_id,
            ));
        }

        let mut saved = result.clone();
        saved.id = next_id(&mut state.counters.result);
        state.results.push(saved.clone());

        self.persist(&state, &[Collection::Results])?;
        Ok(saved)
    }
}

impl QuizRepository for EmbeddedStore {
    fn list_topics(&self) -> StoreResult<Vec<Topic>> {
        Ok(self.read_state()?.sorted_topics())
    }

    fn find_topic(&self, id: TopicId) -> StoreResult<Option<Topic>> {
        let state = self.read_state()?;
        Ok(state.topic_row(id).map(|row| state.topic_view(row)))
    }

    fn find_topic_by_title(&self, title: &str) -> StoreResult<Option<Topic>> {
        let state = self.read_state()?;
        Ok(state
            .topics
            .iter()
            .find(|row| titles_match(&row.title, title))
            .map(|row| state.topic_view(row)))
    }

    fn save_topic(&self, topic: &Topic) -> StoreResult<Topic> {
        log_failed_mutation("topic_save", MODULE, self.put_topic(topic))
    }

    fn delete_topic(&self, id: TopicId) -> StoreResult<()> {
        log_failed_mutation("topic_delete", MODULE, self.remove_topic(id))
    }

    fn find_questions_by_topic(&self, topic_id: TopicId) -> StoreResult<Vec<Question>> {
        Ok(self.read_state()?.questions_of(topic_id))
    }

    fn find_question(&self, id: QuestionId) -> StoreResult<Option<Question>> {
        let state = self.read_state()?;
        Ok(state.question_row(id).map(|row| state.question_view(row)))
    }

    fn find_question_by_title(
        &self,
        topic_id: TopicId,
        title: &str,
    ) -> StoreResult<Option<Question>> {
        let state = self.read_state()?;
        Ok(state
            .questions
            .iter()
            .find(|row| row.topic_id == topic_id && titles_match(&row.title, title))
            .map(|row| state.question_view(row)))
    }

    fn save_question(&self, question: &Question) -> StoreResult<Question> {
        log_failed_mutation("question_save", MODULE, self.put_question(question))
    }

    fn delete_question(&self, id: QuestionId) -> StoreResult<()> {
        log_failed_mutation("question_delete", MODULE, self.remove_question(id))
    }

    fn find_answers_by_question(&self, question_id: QuestionId) -> StoreResult<Vec<Answer>> {
        Ok(self.read_state()?.answers_of(question_id))
    }

    fn save_answer(&self, question_id: QuestionId, answer: &Answer) -> StoreResult<Answer> {
        log_failed_mutation("answer_save", MODULE, self.put_answer(question_id, answer))
    }

    fn delete_answer(&self, id: AnswerId) -> StoreResult<()> {
        log_failed_mutation("answer_delete", MODULE, self.remove_answer(id))
    }

    fn append_result(&self, result: &QuizResult) -> StoreResult<QuizResult> {
        log_failed_mutation("result_append", MODULE, self.push_result(result))
    }

    fn find_results_by_topic(&self, topic_id: TopicId) -> StoreResult<Vec<QuizResult>> {
        Ok(self
            .read_state()?
            .results_matching(|row| row.topic_id == topic_id))
    }

    fn find_results_by_question(&self, question_id: QuestionId) -> StoreResult<Vec<QuizResult>> {
        Ok(self
            .read_state()?
            .results_matching(|row| row.question_id == question_id))
    }

    // Computed under one read guard so a concurrent cascade is never seen
    // half-applied.
    fn statistics_by_topic(&self, topic_id: TopicId) -> StoreResult<Vec<Statistic>> {
        let state = self.read_state()?;
        let topic = state
            .topic_row(topic_id)
            .map(|row| state.topic_view(row))
            .ok_or_else(|| StoreError::not_found(EntityKind::Topic, topic_id))?;
        Ok(state.statistics_of(&topic))
    }

    fn statistics_all(&self) -> StoreResult<Vec<Statistic>> {
        let state = self.read_state()?;
        Ok(state
            .sorted_topics()
            .iter()
            .flat_map(|topic| state.statistics_of(topic))
            .collect())
    }
}

fn read_collection<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PersistenceError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(PersistenceError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Serialization {
        path: path.to_path_buf(),
        source,
    })
}

fn write_collection<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), PersistenceError> {
    let bytes =
        serde_json::to_vec_pretty(rows).map_err(|source| PersistenceError::Serialization {
            path: path.to_path_buf(),
            source,
        })?;
    let io_error = |source: io::Error| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };

    // Sibling temp file renamed over the target; readers see old or new, never a prefix.
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir).map_err(io_error)?;
    staged.write_all(&bytes).map_err(io_error)?;
    staged.as_file().sync_all().map_err(io_error)?;
    staged.persist(path).map_err(|err| io_error(err.error))?;
    Ok(())
}
