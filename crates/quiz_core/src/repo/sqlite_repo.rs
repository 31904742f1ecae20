//! Relational quiz store on SQLite.
//!
//! # Responsibility
//! - Map the quiz repository contract onto `Topics`, `Questions`, `Answers`
//!   and `QuizResults` through parameterized statements.
//! - Own the connection for the lifetime of the store.
//!
//! # Invariants
//! - Foreign keys are enabled, so deletes cascade in the engine.
//! - A question save (row plus answer replacement) is one transaction.
//! - Engine constraint errors are translated before leaving this module.
//! - One connection per store; callers serialize cross-thread access.

use crate::db::{bootstrap_connection, open_db, open_db_in_memory};
use crate::model::{
    Answer, AnswerId, Question, QuestionId, QuizResult, Topic, TopicId,
};
use crate::repo::error::{EntityKind, PersistenceError, StoreError, StoreResult};
use crate::repo::quiz_repo::{log_failed_mutation, QuizRepository};
use log::info;
use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;

const MODULE: &str = "relational";

const TOPIC_SELECT_SQL: &str = "SELECT
    t.id,
    t.title,
    t.description,
    (SELECT COUNT(*) FROM Questions q WHERE q.topic_id = t.id) AS question_count
FROM Topics t";

const QUESTION_SELECT_SQL: &str = "SELECT id, topic_id, title, body FROM Questions";

const RESULT_SELECT_SQL: &str = "SELECT
    id,
    topic_id,
    question_id,
    is_correct,
    answer_revealed,
    response_time_secs,
    answered_at,
    score
FROM QuizResults";

/// Quiz store backed by one SQLite connection.
pub struct RelationalStore {
    conn: Connection,
}

impl RelationalStore {
    /// Opens (or creates) the SQLite file at `path` with the quiz schema.
    ///
    /// # Errors
    /// - `Schema` when the file cannot be opened or initialized.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = open_db(path)?;
        info!(
            "event=store_open module=relational status=ok dialect=sqlite path={}",
            path.display()
        );
        Ok(Self { conn })
    }

    /// Opens a private in-memory database with the quiz schema.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = open_db_in_memory()?;
        Ok(Self { conn })
    }

    /// Adopts an already open SQLite connection and prepares its schema.
    pub fn from_connection(mut conn: Connection) -> StoreResult<Self> {
        bootstrap_connection(&mut conn)?;
        Ok(Self { conn })
    }

    /// Borrow of the underlying connection for read-only inspection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn topic_exists(&self, id: TopicId) -> StoreResult<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM Topics WHERE id = ?1);",
            [id],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(exists)
    }

    fn question_exists(&self, id: QuestionId) -> StoreResult<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM Questions WHERE id = ?1);",
            [id],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(exists)
    }

    fn topic_title_taken(&self, title: &str, except_id: TopicId) -> StoreResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT id FROM Topics WHERE title = ?1 COLLATE NOCASE AND id <> ?2 LIMIT 1;",
                params![title, except_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn question_title_taken(
        &self,
        topic_id: TopicId,
        title: &str,
        except_id: QuestionId,
    ) -> StoreResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT id FROM Questions
                 WHERE topic_id = ?1 AND title = ?2 COLLATE NOCASE AND id <> ?3
                 LIMIT 1;",
                params![topic_id, title, except_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn query_topics(&self, sql: &str, params: impl rusqlite::Params) -> StoreResult<Vec<Topic>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut topics = Vec::new();
        while let Some(row) = rows.next()? {
            topics.push(parse_topic_row(row)?);
        }
        Ok(topics)
    }

    fn query_questions(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> StoreResult<Vec<Question>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut questions = Vec::new();
        while let Some(row) = rows.next()? {
            questions.push(parse_question_row(row)?);
        }

        for question in &mut questions {
            question.answers = self.find_answers_by_question(question.id)?;
        }
        Ok(questions)
    }

    fn query_results(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> StoreResult<Vec<QuizResult>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            results.push(parse_result_row(row)?);
        }
        Ok(results)
    }

    fn write_question(&self, question: &Question) -> StoreResult<QuestionId> {
        let tx = self.conn.unchecked_transaction()?;

        let id = if question.is_new() {
            tx.execute(
                "INSERT INTO Questions (topic_id, title, body) VALUES (?1, ?2, ?3);",
                params![question.topic_id, question.title, question.body],
            )?;
            tx.last_insert_rowid()
        } else {
            let changed = tx.execute(
                "UPDATE Questions SET topic_id = ?1, title = ?2, body = ?3 WHERE id = ?4;",
                params![question.topic_id, question.title, question.body, question.id],
            )?;
            if changed == 0 {
                return Err(StoreError::not_found(EntityKind::Question, question.id));
            }
            question.id
        };

        tx.execute("DELETE FROM Answers WHERE question_id = ?1;", [id])?;
        for answer in &question.answers {
            tx.execute(
                "INSERT INTO Answers (question_id, text, is_correct) VALUES (?1, ?2, ?3);",
                params![id, answer.text, bool_to_int(answer.is_correct)],
            )?;
        }

        tx.commit()?;
        Ok(id)
    }

    fn put_topic(&self, topic: &Topic) -> StoreResult<Topic> {
        if self.topic_title_taken(&topic.title, topic.id)? {
            return Err(StoreError::duplicate_title(EntityKind::Topic, &topic.title));
        }

        let id = if topic.is_new() {
            self.conn
                .execute(
                    "INSERT INTO Topics (title, description) VALUES (?1, ?2);",
                    params![topic.title, topic.description],
                )
                .map_err(|err| map_write_error(err, EntityKind::Topic, &topic.title))?;
            self.conn.last_insert_rowid()
        } else {
            let changed = self
                .conn
                .execute(
                    "UPDATE Topics SET title = ?1, description = ?2 WHERE id = ?3;",
                    params![topic.title, topic.description, topic.id],
                )
                .map_err(|err| map_write_error(err, EntityKind::Topic, &topic.title))?;
            if changed == 0 {
                return Err(StoreError::not_found(EntityKind::Topic, topic.id));
            }
            topic.id
        };

        self.find_topic(id)?
            .ok_or_else(|| StoreError::not_found(EntityKind::Topic, id))
    }

    fn remove_topic(&self, id: TopicId) -> StoreResult<()> {
        let changed = self.conn.execute("DELETE FROM Topics WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(StoreError::not_found(EntityKind::Topic, id));
        }
        info!("event=topic_delete module=relational status=ok topic_id={id}");
        Ok(())
    }

    fn put_question(&self, question: &Question) -> StoreResult<Question> {
        if !self.topic_exists(question.topic_id)? {
            return Err(StoreError::not_found(EntityKind::Topic, question.topic_id));
        }
        if self.question_title_taken(question.topic_id, &question.title, question.id)? {
            return Err(StoreError::duplicate_title(
                EntityKind::Question,
                &question.title,
            ));
        }

        let id = match self.write_question(question) {
            Ok(id) => id,
            Err(StoreError::Persistence(PersistenceError::Sqlite(err))) => {
                return Err(match constraint_code(&err) {
                    Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                        StoreError::not_found(EntityKind::Topic, question.topic_id)
                    }
                    _ => map_write_error(err, EntityKind::Question, &question.title),
                });
            }
            Err(err) => return Err(err),
        };

        self.find_question(id)?
            .ok_or_else(|| StoreError::not_found(EntityKind::Question, id))
    }

    fn remove_question(&self, id: QuestionId) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM Questions WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(StoreError::not_found(EntityKind::Question, id));
        }
        Ok(())
    }

    fn put_answer(&self, question_id: QuestionId, answer: &Answer) -> StoreResult<Answer> {
        if !self.question_exists(question_id)? {
            return Err(StoreError::not_found(EntityKind::Question, question_id));
        }

        if answer.is_new() {
            self.conn.execute(
                "INSERT INTO Answers (question_id, text, is_correct) VALUES (?1, ?2, ?3);",
                params![question_id, answer.text, bool_to_int(answer.is_correct)],
            )?;
            return Ok(Answer {
                id: self.conn.last_insert_rowid(),
                text: answer.text.clone(),
                is_correct: answer.is_correct,
            });
        }

        let changed = self.conn.execute(
            "UPDATE Answers SET text = ?1, is_correct = ?2 WHERE id = ?3 AND question_id = ?4;",
            params![
                answer.text,
                bool_to_int(answer.is_correct),
                answer.id,
                question_id
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found(EntityKind::Answer, answer.id));
        }
        Ok(answer.clone())
    }

    fn remove_answer(&self, id: AnswerId) -> StoreResult<()> {
        let changed = self.conn.execute("DELETE FROM Answers WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(StoreError::not_found(EntityKind::Answer, id));
        }
        Ok(())
    }

    fn push_result(&self, result: &QuizResult) -> StoreResult<QuizResult> {
        if !self.topic_exists(result.topic_id)? {
            return Err(StoreError::not_found(EntityKind::Topic, result.topic_id));
        }
        if !self.question_exists(result.question_id)? {
            return Err(StoreError::not_found(
                EntityKind::Question,
                result.question_id,
            ));
        }

        self.conn
            .execute(
                "INSERT INTO QuizResults (
                    topic_id,
                    question_id,
                    is_correct,
                    answer_revealed,
                    response_time_secs,
                    answered_at,
                    score
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    result.topic_id,
                    result.question_id,
                    bool_to_int(result.is_correct),
                    bool_to_int(result.answer_revealed),
                    result.response_time_secs,
                    result.answered_at,
                    result.score,
                ],
            )
            .map_err(|err| match constraint_code(&err) {
                Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                    StoreError::not_found(EntityKind::Question, result.question_id)
                }
                _ => StoreError::from(err),
            })?;

        let mut saved = result.clone();
        saved.id = self.conn.last_insert_rowid();
        Ok(saved)
    }
}

impl QuizRepository for RelationalStore {
    fn list_topics(&self) -> StoreResult<Vec<Topic>> {
        self.query_topics(
            &format!("{TOPIC_SELECT_SQL} ORDER BY t.title COLLATE NOCASE, t.id;"),
            params![],
        )
    }

    fn find_topic(&self, id: TopicId) -> StoreResult<Option<Topic>> {
        let topics = self.query_topics(&format!("{TOPIC_SELECT_SQL} WHERE t.id = ?1;"), [id])?;
        Ok(topics.into_iter().next())
    }

    fn find_topic_by_title(&self, title: &str) -> StoreResult<Option<Topic>> {
        let topics = self.query_topics(
            &format!("{TOPIC_SELECT_SQL} WHERE t.title = ?1 COLLATE NOCASE LIMIT 1;"),
            [title],
        )?;
        Ok(topics.into_iter().next())
    }

    fn save_topic(&self, topic: &Topic) -> StoreResult<Topic> {
        log_failed_mutation("topic_save", MODULE, self.put_topic(topic))
    }

    fn delete_topic(&self, id: TopicId) -> StoreResult<()> {
        log_failed_mutation("topic_delete", MODULE, self.remove_topic(id))
    }

    fn find_questions_by_topic(&self, topic_id: TopicId) -> StoreResult<Vec<Question>> {
        self.query_questions(
            &format!(
                "{QUESTION_SELECT_SQL} WHERE topic_id = ?1 ORDER BY title COLLATE NOCASE, id;"
            ),
            [topic_id],
        )
    }

    fn find_question(&self, id: QuestionId) -> StoreResult<Option<Question>> {
        let questions =
            self.query_questions(&format!("{QUESTION_SELECT_SQL} WHERE id = ?1;"), [id])?;
        Ok(questions.into_iter().next())
    }

    fn find_question_by_title(
        &self,
        topic_id: TopicId,
        title: &str,
    ) -> StoreResult<Option<Question>> {
        let questions = self.query_questions(
            &format!(
                "{QUESTION_SELECT_SQL} WHERE topic_id = ?1 AND title = ?2 COLLATE NOCASE LIMIT 1;"
            ),
            params![topic_id, title],
        )?;
        Ok(questions.into_iter().next())
    }

    fn save_question(&self, question: &Question) -> StoreResult<Question> {
        log_failed_mutation("question_save", MODULE, self.put_question(question))
    }

    fn delete_question(&self, id: QuestionId) -> StoreResult<()> {
        log_failed_mutation("question_delete", MODULE, self.remove_question(id))
    }

    fn find_answers_by_question(&self, question_id: QuestionId) -> StoreResult<Vec<Answer>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, text, is_correct FROM Answers WHERE question_id = ?1 ORDER BY id;",
        )?;
        let mut rows = stmt.query([question_id])?;
        let mut answers = Vec::new();
        while let Some(row) = rows.next()? {
            answers.push(parse_answer_row(row)?);
        }
        Ok(answers)
    }

    fn save_answer(&self, question_id: QuestionId, answer: &Answer) -> StoreResult<Answer> {
        log_failed_mutation("answer_save", MODULE, self.put_answer(question_id, answer))
    }

    fn delete_answer(&self, id: AnswerId) -> StoreResult<()> {
        log_failed_mutation("answer_delete", MODULE, self.remove_answer(id))
    }

    fn append_result(&self, result: &QuizResult) -> StoreResult<QuizResult> {
        log_failed_mutation("result_append", MODULE, self.push_result(result))
    }

    fn find_results_by_topic(&self, topic_id: TopicId) -> StoreResult<Vec<QuizResult>> {
        self.query_results(
            &format!(
                "{RESULT_SELECT_SQL} WHERE topic_id = ?1 ORDER BY answered_at DESC, id DESC;"
            ),
            [topic_id],
        )
    }

    fn find_results_by_question(&self, question_id: QuestionId) -> StoreResult<Vec<QuizResult>> {
        self.query_results(
            &format!(
                "{RESULT_SELECT_SQL} WHERE question_id = ?1 ORDER BY answered_at DESC, id DESC;"
            ),
            [question_id],
        )
    }
}

fn constraint_code(err: &rusqlite::Error) -> Option<std::os::raw::c_int> {
    match err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            Some(failure.extended_code)
        }
        _ => None,
    }
}

/// Maps a unique-index violation on a title write to `DuplicateTitle`.
fn map_write_error(err: rusqlite::Error, entity: EntityKind, title: &str) -> StoreError {
    match constraint_code(&err) {
        Some(ffi::SQLITE_CONSTRAINT_UNIQUE) => StoreError::duplicate_title(entity, title),
        _ => StoreError::from(err),
    }
}

fn parse_topic_row(row: &Row<'_>) -> StoreResult<Topic> {
    let question_count: i64 = row.get("question_count")?;
    let question_count = u32::try_from(question_count).map_err(|_| {
        StoreError::InvalidData(format!(
            "invalid question count `{question_count}` for Topics.id"
        ))
    })?;

    Ok(Topic {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        question_count,
    })
}

fn parse_question_row(row: &Row<'_>) -> StoreResult<Question> {
    Ok(Question {
        id: row.get("id")?,
        topic_id: row.get("topic_id")?,
        title: row.get("title")?,
        body: row.get("body")?,
        answers: Vec::new(),
    })
}

fn parse_answer_row(row: &Row<'_>) -> StoreResult<Answer> {
    Ok(Answer {
        id: row.get("id")?,
        text: row.get("text")?,
        is_correct: parse_flag(row.get("is_correct")?, "Answers.is_correct")?,
    })
}

fn parse_result_row(row: &Row<'_>) -> StoreResult<QuizResult> {
    let response_time_secs: i64 = row.get("response_time_secs")?;
    let response_time_secs = u32::try_from(response_time_secs).map_err(|_| {
        StoreError::InvalidData(format!(
            "invalid response time `{response_time_secs}` in QuizResults.response_time_secs"
        ))
    })?;
    let score: i64 = row.get("score")?;
    let score = i32::try_from(score).map_err(|_| {
        StoreError::InvalidData(format!("invalid score `{score}` in QuizResults.score"))
    })?;

    Ok(QuizResult {
        id: row.get("id")?,
        topic_id: row.get("topic_id")?,
        question_id: row.get("question_id")?,
        is_correct: parse_flag(row.get("is_correct")?, "QuizResults.is_correct")?,
        answer_revealed: parse_flag(
            row.get("answer_revealed")?,
            "QuizResults.answer_revealed",
        )?,
        response_time_secs,
        answered_at: row.get("answered_at")?,
        score,
    })
}

fn parse_flag(value: i64, column: &str) -> StoreResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StoreError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
