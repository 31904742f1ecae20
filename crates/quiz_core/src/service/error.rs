//! Service-layer errors.
//!
//! Validation failures are raised before any store call; store failures pass
//! through unchanged so callers can still match on `StoreError`.

use crate::repo::error::{EntityKind, StoreError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Input rejected before it reaches a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    BlankTitle(EntityKind),
    TitleTooLong {
        entity: EntityKind,
        max: usize,
        actual: usize,
    },
    BlankDescription,
    BlankBody,
    BodyTooLong { max: usize, actual: usize },
    NoAnswers,
    AnswerTooLong { max: usize, actual: usize },
    /// An answer is flagged correct but has no text.
    BlankCorrectAnswer,
    NoCorrectAnswer,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle(entity) => write!(f, "{entity} title must not be blank"),
            Self::TitleTooLong {
                entity,
                max,
                actual,
            } => write!(f, "{entity} title has {actual} characters; at most {max} allowed"),
            Self::BlankDescription => f.write_str("topic description must not be blank"),
            Self::BlankBody => f.write_str("question text must not be blank"),
            Self::BodyTooLong { max, actual } => {
                write!(f, "question text has {actual} characters; at most {max} allowed")
            }
            Self::NoAnswers => f.write_str("a question needs at least one answer"),
            Self::AnswerTooLong { max, actual } => {
                write!(f, "answer text has {actual} characters; at most {max} allowed")
            }
            Self::BlankCorrectAnswer => f.write_str("an answer marked correct has no text"),
            Self::NoCorrectAnswer => f.write_str("at least one answer must be marked correct"),
        }
    }
}

impl Error for ValidationError {}

/// Error returned by service operations.
#[derive(Debug)]
pub enum ServiceError {
    Validation(ValidationError),
    Store(StoreError),
}

impl ServiceError {
    /// Whether the failure is a duplicate title, from pre-check or store.
    pub fn is_duplicate_title(&self) -> bool {
        matches!(self, Self::Store(StoreError::DuplicateTitle { .. }))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(StoreError::NotFound { .. }))
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}
