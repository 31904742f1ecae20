//! Quiz result recording and statistics use-cases.

use super::error::ServiceResult;
use crate::model::{now_epoch_ms, QuestionId, QuizResult, TopicId};
use crate::repo::error::{EntityKind, StoreError};
use crate::repo::quiz_repo::QuizRepository;
use crate::stats::{summarize_all, summarize_topic, Statistic};

/// One answered question as reported by the quiz player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub topic_id: TopicId,
    pub question_id: QuestionId,
    pub is_correct: bool,
    pub answer_revealed: bool,
    pub response_time_secs: u32,
    pub score: i32,
}

/// Appends quiz results and derives statistics from them.
pub struct QuizResultService<'repo, R: QuizRepository + ?Sized> {
    repo: &'repo R,
}

impl<'repo, R: QuizRepository + ?Sized> QuizResultService<'repo, R> {
    pub fn new(repo: &'repo R) -> Self {
        Self { repo }
    }

    /// Stores `outcome` stamped with the current time.
    pub fn record_result(&self, outcome: &AnswerOutcome) -> ServiceResult<QuizResult> {
        self.record_result_at(outcome, now_epoch_ms())
    }

    /// Stores `outcome` with an explicit timestamp in epoch milliseconds.
    pub fn record_result_at(
        &self,
        outcome: &AnswerOutcome,
        answered_at: i64,
    ) -> ServiceResult<QuizResult> {
        let result = QuizResult::new(
            outcome.topic_id,
            outcome.question_id,
            outcome.is_correct,
            outcome.answer_revealed,
            outcome.response_time_secs,
            outcome.score,
            answered_at,
        );
        Ok(self.repo.append_result(&result)?)
    }

    pub fn results_of_topic(&self, topic_id: TopicId) -> ServiceResult<Vec<QuizResult>> {
        Ok(self.repo.find_results_by_topic(topic_id)?)
    }

    pub fn results_of_question(&self, question_id: QuestionId) -> ServiceResult<Vec<QuizResult>> {
        Ok(self.repo.find_results_by_question(question_id)?)
    }

    /// Per-question statistics of one topic.
    pub fn question_statistics(&self, topic_id: TopicId) -> ServiceResult<Vec<Statistic>> {
        Ok(self.repo.statistics_by_topic(topic_id)?)
    }

    /// Per-question statistics of every topic.
    pub fn all_question_statistics(&self) -> ServiceResult<Vec<Statistic>> {
        Ok(self.repo.statistics_all()?)
    }

    /// One aggregate over every result of a topic.
    pub fn topic_summary(&self, topic_id: TopicId) -> ServiceResult<Statistic> {
        let topic = self
            .repo
            .find_topic(topic_id)?
            .ok_or_else(|| StoreError::not_found(EntityKind::Topic, topic_id))?;
        let results = self.repo.find_results_by_topic(topic_id)?;
        Ok(summarize_topic(topic.id, &topic.title, &results))
    }

    /// One aggregate over every stored result.
    pub fn overall_summary(&self) -> ServiceResult<Statistic> {
        let mut results = Vec::new();
        for topic in self.repo.list_topics()? {
            results.extend(self.repo.find_results_by_topic(topic.id)?);
        }
        Ok(summarize_all(&results))
    }
}
