//! Statistic aggregate and its folding rules.
//!
//! Running totals are integers, so averages computed incrementally match the
//! batch computation bit for bit.

use crate::model::{Question, QuestionId, QuizResult, Topic, TopicId};
use log::debug;
use serde::{Deserialize, Serialize};

/// Label used by [`summarize_all`].
pub const ALL_TOPICS_LABEL: &str = "All topics";

/// Aggregate over a set of quiz results.
///
/// `question_id == 0` marks topic-level or global aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistic {
    pub topic_id: TopicId,
    pub topic_title: String,
    pub question_id: QuestionId,
    pub question_title: String,
    pub attempts: u32,
    pub correct: u32,
    pub incorrect: u32,
    /// Arithmetic mean in seconds, `0.0` without attempts.
    pub average_response_secs: f64,
    /// Percentage in `0.0..=100.0`, `0.0` without attempts.
    pub success_rate: f64,
    /// Mean score truncated toward zero.
    pub average_score: i64,
    /// Highest score seen, `0` without attempts.
    pub best_score: i32,
    total_response_secs: u64,
    total_score: i64,
}

impl Statistic {
    /// Creates an empty statistic with the given labels.
    pub fn labelled(
        topic_id: TopicId,
        topic_title: impl Into<String>,
        question_id: QuestionId,
        question_title: impl Into<String>,
    ) -> Self {
        Self {
            topic_id,
            topic_title: topic_title.into(),
            question_id,
            question_title: question_title.into(),
            attempts: 0,
            correct: 0,
            incorrect: 0,
            average_response_secs: 0.0,
            success_rate: 0.0,
            average_score: 0,
            best_score: 0,
            total_response_secs: 0,
            total_score: 0,
        }
    }

    /// Creates an empty statistic labelled for one question of one topic.
    pub fn for_question(topic: &Topic, question: &Question) -> Self {
        Self::labelled(topic.id, topic.title.as_str(), question.id, question.title.as_str())
    }

    /// Replaces the aggregate with a full scan over `results`.
    pub fn with_results(mut self, results: &[QuizResult]) -> Self {
        let attempts = results.len();
        let correct = results.iter().filter(|result| result.is_correct).count();

        self.attempts = saturating_u32(attempts);
        self.correct = saturating_u32(correct);
        self.incorrect = saturating_u32(attempts - correct);
        self.total_response_secs = results
            .iter()
            .map(|result| u64::from(result.response_time_secs))
            .sum();
        self.total_score = results.iter().map(|result| i64::from(result.score)).sum();
        self.best_score = results.iter().map(|result| result.score).max().unwrap_or(0);
        self.refresh_derived();
        self
    }

    /// Folds one more result into the running aggregate.
    pub fn record(&mut self, result: &QuizResult) {
        self.attempts = self.attempts.saturating_add(1);
        if result.is_correct {
            self.correct = self.correct.saturating_add(1);
        } else {
            self.incorrect = self.incorrect.saturating_add(1);
        }
        self.total_response_secs += u64::from(result.response_time_secs);
        self.total_score += i64::from(result.score);
        if self.attempts == 1 || result.score > self.best_score {
            self.best_score = result.score;
        }
        self.refresh_derived();
    }

    fn refresh_derived(&mut self) {
        if self.attempts == 0 {
            self.average_response_secs = 0.0;
            self.success_rate = 0.0;
            self.average_score = 0;
            return;
        }

        let attempts = f64::from(self.attempts);
        self.average_response_secs = self.total_response_secs as f64 / attempts;
        self.success_rate = f64::from(self.correct) / attempts * 100.0;
        // Integer division truncates toward zero for negative totals too.
        self.average_score = self.total_score / i64::from(self.attempts);
    }
}

/// Aggregates all results of one topic into a single statistic.
pub fn summarize_topic(
    topic_id: TopicId,
    topic_title: &str,
    results: &[QuizResult],
) -> Statistic {
    let statistic = Statistic::labelled(topic_id, topic_title, 0, "").with_results(results);
    debug!(
        "event=stats_summarize module=stats scope=topic topic_id={} attempts={}",
        topic_id, statistic.attempts
    );
    statistic
}

/// Aggregates results across every topic into a single statistic.
pub fn summarize_all(results: &[QuizResult]) -> Statistic {
    let statistic = Statistic::labelled(0, ALL_TOPICS_LABEL, 0, "").with_results(results);
    debug!(
        "event=stats_summarize module=stats scope=all attempts={}",
        statistic.attempts
    );
    statistic
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::{summarize_all, summarize_topic, Statistic, ALL_TOPICS_LABEL};
    use crate::model::QuizResult;

    fn result(is_correct: bool, secs: u32, score: i32) -> QuizResult {
        QuizResult::new(1, 7, is_correct, false, secs, score, 1_700_000_000_000)
    }

    fn sample() -> Vec<QuizResult> {
        vec![result(true, 10, 5), result(false, 20, 0), result(true, 15, 8)]
    }

    #[test]
    fn batch_aggregation_matches_worked_example() {
        let statistic = Statistic::labelled(1, "Java", 7, "Basics").with_results(&sample());

        assert_eq!(statistic.attempts, 3);
        assert_eq!(statistic.correct, 2);
        assert_eq!(statistic.incorrect, 1);
        assert!((statistic.success_rate - 66.666_666).abs() < 0.001);
        assert!((statistic.average_response_secs - 15.0).abs() < f64::EPSILON);
        assert_eq!(statistic.average_score, 4);
        assert_eq!(statistic.best_score, 8);
    }

    #[test]
    fn incremental_aggregation_equals_batch() {
        let inputs = [
            sample(),
            vec![result(false, 3, -4), result(false, 9, -1)],
            vec![result(true, 1, 3), result(true, 2, 3), result(true, 4, 3)],
            (0..50)
                .map(|index: u32| {
                    let score = i32::try_from(index * 11 % 17).unwrap() - 5;
                    result(index % 3 == 0, index * 7 % 13, score)
                })
                .collect(),
        ];

        for results in inputs {
            let batch = Statistic::labelled(1, "t", 2, "q").with_results(&results);
            let mut running = Statistic::labelled(1, "t", 2, "q");
            for item in &results {
                running.record(item);
            }
            assert_eq!(running, batch);
        }
    }

    #[test]
    fn empty_input_yields_zeroes() {
        let statistic = Statistic::labelled(1, "t", 2, "q").with_results(&[]);
        assert_eq!(statistic.attempts, 0);
        assert_eq!(statistic.success_rate, 0.0);
        assert_eq!(statistic.average_response_secs, 0.0);
        assert_eq!(statistic.average_score, 0);
        assert_eq!(statistic.best_score, 0);
    }

    #[test]
    fn negative_scores_truncate_toward_zero() {
        let results = [result(false, 1, -3), result(false, 1, -2)];
        let statistic = Statistic::labelled(1, "t", 2, "q").with_results(&results);
        assert_eq!(statistic.average_score, -2);
        assert_eq!(statistic.best_score, -2);
    }

    #[test]
    fn summaries_carry_scope_labels() {
        let topic = summarize_topic(4, "Rust", &sample());
        assert_eq!(topic.topic_id, 4);
        assert_eq!(topic.topic_title, "Rust");
        assert_eq!(topic.question_id, 0);
        assert_eq!(topic.attempts, 3);

        let all = summarize_all(&sample());
        assert_eq!(all.topic_title, ALL_TOPICS_LABEL);
        assert_eq!(all.best_score, 8);
    }
}
