//! Use-case services over any quiz store.
//!
//! # Responsibility
//! - Validate caller input before it reaches a store.
//! - Pre-check title uniqueness so callers get `DuplicateTitle` early.
//!
//! # Invariants
//! - Services borrow a store; they never own or pick a backend.
//! - Titles and texts are trimmed before validation and storage.

pub mod error;
pub mod question_service;
pub mod result_service;
pub mod topic_service;

pub use error::{ServiceError, ServiceResult, ValidationError};
pub use question_service::QuestionService;
pub use result_service::QuizResultService;
pub use topic_service::TopicService;

/// Maximum topic and question title length in characters.
pub const MAX_TITLE_CHARS: usize = 100;
/// Maximum question text length in characters.
pub const MAX_BODY_CHARS: usize = 500;
/// Maximum answer text length in characters.
pub const MAX_ANSWER_CHARS: usize = 200;

fn char_len(value: &str) -> usize {
    value.chars().count()
}
