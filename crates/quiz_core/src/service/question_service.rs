//! Question use-cases.
//!
//! Blank answers that are not marked correct are unused slots and are
//! dropped before the question is stored.

use super::error::{ServiceResult, ValidationError};
use super::{char_len, MAX_ANSWER_CHARS, MAX_BODY_CHARS, MAX_TITLE_CHARS};
use crate::model::{Answer, Question, QuestionId, TopicId};
use crate::repo::error::{EntityKind, StoreError};
use crate::repo::quiz_repo::QuizRepository;
use log::info;

/// Caller input for creating or replacing a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub topic_id: TopicId,
    pub title: String,
    pub body: String,
    pub answers: Vec<Answer>,
}

impl QuestionDraft {
    pub fn new(
        topic_id: TopicId,
        title: impl Into<String>,
        body: impl Into<String>,
        answers: Vec<Answer>,
    ) -> Self {
        Self {
            topic_id,
            title: title.into(),
            body: body.into(),
            answers,
        }
    }
}

/// Validating front for question CRUD.
pub struct QuestionService<'repo, R: QuizRepository + ?Sized> {
    repo: &'repo R,
}

impl<'repo, R: QuizRepository + ?Sized> QuestionService<'repo, R> {
    pub fn new(repo: &'repo R) -> Self {
        Self { repo }
    }

    /// Creates a question with its answers.
    ///
    /// # Errors
    /// - `Validation` for malformed input.
    /// - `Store(DuplicateTitle)` when the topic already has this title.
    /// - `Store(NotFound)` when the topic does not exist.
    pub fn create_question(&self, draft: &QuestionDraft) -> ServiceResult<Question> {
        let question = checked_question(0, draft)?;
        if self
            .repo
            .question_title_exists(question.topic_id, &question.title)?
        {
            return Err(StoreError::duplicate_title(EntityKind::Question, question.title).into());
        }

        let saved = self.repo.save_question(&question)?;
        info!(
            "event=question_create module=service status=ok question_id={} topic_id={} answers={}",
            saved.id,
            saved.topic_id,
            saved.answers.len()
        );
        Ok(saved)
    }

    /// Replaces title, text, topic and the whole answer list of a question.
    pub fn update_question(&self, id: QuestionId, draft: &QuestionDraft) -> ServiceResult<Question> {
        let question = checked_question(id, draft)?;
        if self.repo.find_question(id)?.is_none() {
            return Err(StoreError::not_found(EntityKind::Question, id).into());
        }

        if let Some(other) = self
            .repo
            .find_question_by_title(question.topic_id, &question.title)?
        {
            if other.id != id {
                return Err(
                    StoreError::duplicate_title(EntityKind::Question, question.title).into(),
                );
            }
        }

        Ok(self.repo.save_question(&question)?)
    }

    pub fn delete_question(&self, id: QuestionId) -> ServiceResult<()> {
        self.repo.delete_question(id)?;
        Ok(())
    }

    pub fn questions_of_topic(&self, topic_id: TopicId) -> ServiceResult<Vec<Question>> {
        Ok(self.repo.find_questions_by_topic(topic_id)?)
    }

    pub fn questions_of_topic_title(&self, topic_title: &str) -> ServiceResult<Vec<Question>> {
        Ok(self.repo.find_questions_by_topic_title(topic_title.trim())?)
    }

    pub fn find_question(&self, id: QuestionId) -> ServiceResult<Option<Question>> {
        Ok(self.repo.find_question(id)?)
    }
}

fn checked_question(id: QuestionId, draft: &QuestionDraft) -> Result<Question, ValidationError> {
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(ValidationError::BlankTitle(EntityKind::Question));
    }
    if char_len(title) > MAX_TITLE_CHARS {
        return Err(ValidationError::TitleTooLong {
            entity: EntityKind::Question,
            max: MAX_TITLE_CHARS,
            actual: char_len(title),
        });
    }

    let body = draft.body.trim();
    if body.is_empty() {
        return Err(ValidationError::BlankBody);
    }
    if char_len(body) > MAX_BODY_CHARS {
        return Err(ValidationError::BodyTooLong {
            max: MAX_BODY_CHARS,
            actual: char_len(body),
        });
    }

    let question = Question {
        id,
        topic_id: draft.topic_id,
        title: title.to_string(),
        body: body.to_string(),
        answers: checked_answers(&draft.answers)?,
    };
    if question.correct_answers().next().is_none() {
        return Err(ValidationError::NoCorrectAnswer);
    }
    Ok(question)
}

fn checked_answers(answers: &[Answer]) -> Result<Vec<Answer>, ValidationError> {
    if answers.is_empty() {
        return Err(ValidationError::NoAnswers);
    }

    let mut kept = Vec::with_capacity(answers.len());
    for answer in answers {
        let text = answer.text.trim();
        if text.is_empty() {
            if answer.is_correct {
                return Err(ValidationError::BlankCorrectAnswer);
            }
            continue;
        }
        if char_len(text) > MAX_ANSWER_CHARS {
            return Err(ValidationError::AnswerTooLong {
                max: MAX_ANSWER_CHARS,
                actual: char_len(text),
            });
        }
        kept.push(Answer::new(text, answer.is_correct));
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::{checked_answers, checked_question, QuestionDraft};
    use crate::model::Answer;
    use crate::service::ValidationError;

    #[test]
    fn blank_wrong_answers_are_dropped() {
        let answers = vec![
            Answer::new(" 4 ", true),
            Answer::new("", false),
            Answer::new("5", false),
        ];
        let kept = checked_answers(&answers).unwrap();
        assert_eq!(kept, vec![Answer::new("4", true), Answer::new("5", false)]);
    }

    #[test]
    fn answer_rules_are_enforced() {
        assert_eq!(checked_answers(&[]), Err(ValidationError::NoAnswers));
        assert_eq!(
            checked_answers(&[Answer::new("  ", true)]),
            Err(ValidationError::BlankCorrectAnswer)
        );
        let no_correct = QuestionDraft::new(
            1,
            "Q",
            "b",
            vec![Answer::new("a", false), Answer::new("", false)],
        );
        assert_eq!(
            checked_question(0, &no_correct),
            Err(ValidationError::NoCorrectAnswer)
        );
        assert!(matches!(
            checked_answers(&[Answer::new("x".repeat(201), true)]),
            Err(ValidationError::AnswerTooLong { actual: 201, .. })
        ));
    }

    #[test]
    fn body_length_is_limited() {
        let draft = QuestionDraft::new(1, "Q", "b".repeat(501), vec![Answer::new("a", true)]);
        assert!(matches!(
            checked_question(0, &draft),
            Err(ValidationError::BodyTooLong { actual: 501, .. })
        ));

        let draft = QuestionDraft::new(1, "Q", "b".repeat(500), vec![Answer::new("a", true)]);
        assert_eq!(checked_question(0, &draft).unwrap().body.len(), 500);
    }
}
