//! Plain records shared by every store backend.
//!
//! # Responsibility
//! - Define topic, question, answer and quiz result records.
//! - Keep records free of storage details so both backends map onto them.
//!
//! # Invariants
//! - Identifiers are assigned by the store; `id <= 0` means "not stored yet".

pub mod question;
pub mod quiz_result;
pub mod topic;

pub use question::{Answer, AnswerId, Question, QuestionId};
pub use quiz_result::{now_epoch_ms, QuizResult, QuizResultId};
pub use topic::{Topic, TopicId};
