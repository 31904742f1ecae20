//! Topic use-cases.

use super::error::{ServiceResult, ValidationError};
use super::{char_len, MAX_TITLE_CHARS};
use crate::model::{Topic, TopicId};
use crate::repo::error::{EntityKind, StoreError};
use crate::repo::quiz_repo::QuizRepository;
use log::info;

/// Validating front for topic CRUD.
pub struct TopicService<'repo, R: QuizRepository + ?Sized> {
    repo: &'repo R,
}

impl<'repo, R: QuizRepository + ?Sized> TopicService<'repo, R> {
    pub fn new(repo: &'repo R) -> Self {
        Self { repo }
    }

    /// Creates a topic after validation and a title pre-check.
    pub fn create_topic(&self, title: &str, description: &str) -> ServiceResult<Topic> {
        let (title, description) = validate_topic(title, description)?;
        if self.repo.topic_title_exists(title)? {
            return Err(StoreError::duplicate_title(EntityKind::Topic, title).into());
        }

        let topic = self.repo.save_topic(&Topic::new(title, description))?;
        info!(
            "event=topic_create module=service status=ok topic_id={}",
            topic.id
        );
        Ok(topic)
    }

    /// Renames or redescribes an existing topic.
    pub fn update_topic(
        &self,
        id: TopicId,
        title: &str,
        description: &str,
    ) -> ServiceResult<Topic> {
        let (title, description) = validate_topic(title, description)?;
        let mut topic = self
            .repo
            .find_topic(id)?
            .ok_or_else(|| StoreError::not_found(EntityKind::Topic, id))?;

        if let Some(other) = self.repo.find_topic_by_title(title)? {
            if other.id != id {
                return Err(StoreError::duplicate_title(EntityKind::Topic, title).into());
            }
        }

        topic.title = title.to_string();
        topic.description = description.to_string();
        Ok(self.repo.save_topic(&topic)?)
    }

    pub fn delete_topic(&self, id: TopicId) -> ServiceResult<()> {
        self.repo.delete_topic(id)?;
        Ok(())
    }

    pub fn list_topics(&self) -> ServiceResult<Vec<Topic>> {
        Ok(self.repo.list_topics()?)
    }

    pub fn find_topic(&self, id: TopicId) -> ServiceResult<Option<Topic>> {
        Ok(self.repo.find_topic(id)?)
    }

    pub fn find_topic_by_title(&self, title: &str) -> ServiceResult<Option<Topic>> {
        Ok(self.repo.find_topic_by_title(title.trim())?)
    }
}

fn validate_topic<'a>(
    title: &'a str,
    description: &'a str,
) -> Result<(&'a str, &'a str), ValidationError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::BlankTitle(EntityKind::Topic));
    }
    if char_len(title) > MAX_TITLE_CHARS {
        return Err(ValidationError::TitleTooLong {
            entity: EntityKind::Topic,
            max: MAX_TITLE_CHARS,
            actual: char_len(title),
        });
    }

    let description = description.trim();
    if description.is_empty() {
        return Err(ValidationError::BlankDescription);
    }
    Ok((title, description))
}
