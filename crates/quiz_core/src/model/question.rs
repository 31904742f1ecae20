//! Question and answer records.
//!
//! # Invariants
//! - Answers never exist outside their owning question.
//! - Saving a question replaces its whole answer list.

use super::topic::TopicId;
use serde::{Deserialize, Serialize};

pub type QuestionId = i64;
pub type AnswerId = i64;

/// Selectable option of one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub id: AnswerId,
    pub text: String,
    pub is_correct: bool,
}

impl Answer {
    /// Creates an unsaved answer.
    pub fn new(text: impl Into<String>, is_correct: bool) -> Self {
        Self {
            id: 0,
            text: text.into(),
            is_correct,
        }
    }

    pub fn is_new(&self) -> bool {
        self.id <= 0
    }
}

/// Quiz item owned by one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub topic_id: TopicId,
    /// Unique within the owning topic under ASCII case folding.
    pub title: String,
    pub body: String,
    /// Ordered by answer id when read back from a store.
    pub answers: Vec<Answer>,
}

impl Question {
    /// Creates an unsaved question under `topic_id`.
    pub fn new(
        topic_id: TopicId,
        title: impl Into<String>,
        body: impl Into<String>,
        answers: Vec<Answer>,
    ) -> Self {
        Self {
            id: 0,
            topic_id,
            title: title.into(),
            body: body.into(),
            answers,
        }
    }

    pub fn is_new(&self) -> bool {
        self.id <= 0
    }

    /// Iterates answers flagged as correct.
    pub fn correct_answers(&self) -> impl Iterator<Item = &Answer> {
        self.answers.iter().filter(|answer| answer.is_correct)
    }
}
