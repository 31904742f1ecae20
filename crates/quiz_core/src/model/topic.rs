//! Topic record.
//!
//! # Invariants
//! - `id <= 0` marks a record that has not been stored yet.
//! - `question_count` is derived by the store on every read and is ignored
//!   on save.

use serde::{Deserialize, Serialize};

/// Store-assigned topic identifier.
pub type TopicId = i64;

/// Named quiz subject that owns questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    /// Unique among topics under ASCII case folding.
    pub title: String,
    pub description: String,
    /// Number of questions currently owned by this topic.
    #[serde(default)]
    pub question_count: u32,
}

impl Topic {
    /// Creates an unsaved topic.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: 0,
            title: title.into(),
            description: description.into(),
            question_count: 0,
        }
    }

    /// Returns whether saving this record creates a new topic.
    pub fn is_new(&self) -> bool {
        self.id <= 0
    }
}
