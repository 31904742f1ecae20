//! Repository contract implemented by every quiz store backend.
//!
//! # Responsibility
//! - Define CRUD and query operations for topics, questions, answers and
//!   quiz results.
//! - Define the shared title comparison and ordering rules.
//!
//! # Invariants
//! - `save_*` with `id <= 0` creates; `id > 0` updates an existing record or
//!   fails with `NotFound`.
//! - Topic and question lists are ordered by title (ASCII case-insensitive),
//!   then id.
//! - Quiz results are listed newest first.
//! - Deleting a topic removes its questions, their answers and all results
//!   referencing them.

use crate::model::{
    Answer, AnswerId, Question, QuestionId, QuizResult, Topic, TopicId,
};
use crate::repo::error::{EntityKind, StoreError, StoreResult};
use crate::stats::Statistic;
use log::error;
use std::cmp::Ordering;

/// Storage contract consumed by services.
pub trait QuizRepository {
    /// Lists all topics ordered by title.
    fn list_topics(&self) -> StoreResult<Vec<Topic>>;
    fn find_topic(&self, id: TopicId) -> StoreResult<Option<Topic>>;
    /// Looks a topic up by case-insensitive title.
    fn find_topic_by_title(&self, title: &str) -> StoreResult<Option<Topic>>;
    /// Creates or fully replaces title and description of a topic.
    fn save_topic(&self, topic: &Topic) -> StoreResult<Topic>;
    /// Deletes a topic and everything it owns.
    fn delete_topic(&self, id: TopicId) -> StoreResult<()>;

    fn topic_title_exists(&self, title: &str) -> StoreResult<bool> {
        Ok(self.find_topic_by_title(title)?.is_some())
    }

    /// Lists the questions of one topic ordered by title.
    fn find_questions_by_topic(&self, topic_id: TopicId) -> StoreResult<Vec<Question>>;
    fn find_question(&self, id: QuestionId) -> StoreResult<Option<Question>>;
    fn find_question_by_title(
        &self,
        topic_id: TopicId,
        title: &str,
    ) -> StoreResult<Option<Question>>;
    /// Creates or updates a question and replaces its whole answer list.
    fn save_question(&self, question: &Question) -> StoreResult<Question>;
    /// Deletes a question, its answers and its results.
    fn delete_question(&self, id: QuestionId) -> StoreResult<()>;

    fn question_title_exists(&self, topic_id: TopicId, title: &str) -> StoreResult<bool> {
        Ok(self.find_question_by_title(topic_id, title)?.is_some())
    }

    /// Lists the questions of the topic titled `topic_title`, or nothing.
    fn find_questions_by_topic_title(&self, topic_title: &str) -> StoreResult<Vec<Question>> {
        match self.find_topic_by_title(topic_title)? {
            Some(topic) => self.find_questions_by_topic(topic.id),
            None => Ok(Vec::new()),
        }
    }

    /// Lists answers of one question ordered by id.
    fn find_answers_by_question(&self, question_id: QuestionId) -> StoreResult<Vec<Answer>>;
    /// Creates an answer under `question_id` or updates one it already owns.
    fn save_answer(&self, question_id: QuestionId, answer: &Answer) -> StoreResult<Answer>;
    fn delete_answer(&self, id: AnswerId) -> StoreResult<()>;

    /// Appends a result and returns it with its assigned id.
    fn append_result(&self, result: &QuizResult) -> StoreResult<QuizResult>;
    fn find_results_by_topic(&self, topic_id: TopicId) -> StoreResult<Vec<QuizResult>>;
    fn find_results_by_question(&self, question_id: QuestionId) -> StoreResult<Vec<QuizResult>>;

    /// One statistic per question of the topic, in question order.
    fn statistics_by_topic(&self, topic_id: TopicId) -> StoreResult<Vec<Statistic>> {
        let topic = self
            .find_topic(topic_id)?
            .ok_or_else(|| StoreError::not_found(EntityKind::Topic, topic_id))?;

        self.find_questions_by_topic(topic_id)?
            .iter()
            .map(|question| {
                let results = self.find_results_by_question(question.id)?;
                Ok(Statistic::for_question(&topic, question).with_results(&results))
            })
            .collect()
    }

    /// Per-question statistics of every topic, in topic order.
    fn statistics_all(&self) -> StoreResult<Vec<Statistic>> {
        let mut all = Vec::new();
        for topic in self.list_topics()? {
            all.extend(self.statistics_by_topic(topic.id)?);
        }
        Ok(all)
    }
}

/// Logs a failed mutation as one `status=error` line and passes it through.
pub(crate) fn log_failed_mutation<T>(
    event: &str,
    module: &str,
    outcome: StoreResult<T>,
) -> StoreResult<T> {
    if let Err(err) = &outcome {
        error!(
            "event={event} module={module} status=error error_code={} error={err}",
            err.code()
        );
    }
    outcome
}

/// Compares titles with ASCII case folding, matching SQL `NOCASE`.
pub fn titles_match(left: &str, right: &str) -> bool {
    left.eq_ignore_ascii_case(right)
}

/// Orders titles with ASCII case folding, matching SQL `NOCASE`.
pub fn compare_titles(left: &str, right: &str) -> Ordering {
    left.bytes()
        .map(|byte| byte.to_ascii_lowercase())
        .cmp(right.bytes().map(|byte| byte.to_ascii_lowercase()))
}

/// Orders results newest first, ties broken by descending id.
pub fn compare_results_newest_first(left: &QuizResult, right: &QuizResult) -> Ordering {
    right
        .answered_at
        .cmp(&left.answered_at)
        .then_with(|| right.id.cmp(&left.id))
}
