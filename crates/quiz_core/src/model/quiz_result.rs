//! Quiz result record.
//!
//! Results are append-only: stores assign an id on append and never update
//! them afterwards.

use super::question::QuestionId;
use super::topic::TopicId;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub type QuizResultId = i64;

/// One answered attempt at a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResult {
    pub id: QuizResultId,
    pub topic_id: TopicId,
    pub question_id: QuestionId,
    pub is_correct: bool,
    /// The player revealed the solution before submitting.
    pub answer_revealed: bool,
    pub response_time_secs: u32,
    /// Unix epoch milliseconds.
    pub answered_at: i64,
    pub score: i32,
}

impl QuizResult {
    /// Creates an unsaved result.
    pub fn new(
        topic_id: TopicId,
        question_id: QuestionId,
        is_correct: bool,
        answer_revealed: bool,
        response_time_secs: u32,
        score: i32,
        answered_at: i64,
    ) -> Self {
        Self {
            id: 0,
            topic_id,
            question_id,
            is_correct,
            answer_revealed,
            response_time_secs,
            answered_at,
            score,
        }
    }
}

/// Current wall-clock time in Unix epoch milliseconds.
///
/// Falls back to `0` if the system clock is set before the epoch.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
