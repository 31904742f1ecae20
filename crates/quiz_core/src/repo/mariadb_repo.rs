//! Relational quiz store on a MariaDB server.
//!
//! # Responsibility
//! - Map the quiz repository contract onto the MariaDB dialect of the quiz
//!   schema through a `sqlx` connection pool.
//! - Drive the async pool from the synchronous contract on a runtime owned
//!   by the store.
//!
//! # Invariants
//! - The schema exists before the store is handed out.
//! - A question save (row plus answer replacement) is one transaction.
//! - Deletes cascade through InnoDB foreign keys.
//! - An unreachable server at open time is `Unavailable`.

use crate::config::MariaDbConfig;
use crate::db::initialize_mariadb_schema;
use crate::model::{
    Answer, AnswerId, Question, QuestionId, QuizResult, Topic, TopicId,
};
use crate::repo::error::{EntityKind, PersistenceError, StoreError, StoreResult};
use crate::repo::quiz_repo::{log_failed_mutation, QuizRepository};
use log::{error, info, LevelFilter};
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{ConnectOptions, MySql, MySqlPool, Row};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

const MODULE: &str = "mariadb";
const MAX_CONNECTIONS: u32 = 4;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

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

const TOPIC_EXISTS_SQL: &str = "SELECT id FROM Topics WHERE id = ?";
const QUESTION_EXISTS_SQL: &str = "SELECT id FROM Questions WHERE id = ?";

type MySqlQuery<'q> = Query<'q, MySql, MySqlArguments>;

/// Quiz store backed by a MariaDB connection pool.
pub struct MariaDbStore {
    pool: MySqlPool,
    runtime: Runtime,
    endpoint: String,
}

impl MariaDbStore {
    /// Connects to the configured server and creates the quiz schema.
    ///
    /// # Errors
    /// - `Unavailable` when the server cannot be reached or rejects the login.
    /// - `Schema` when a DDL statement fails.
    pub fn open(config: &MariaDbConfig) -> StoreResult<Self> {
        let endpoint = format!("{}:{}/{}", config.host, config.port, config.database);
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| unavailable(&endpoint, err))?;

        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database)
            .log_statements(LevelFilter::Debug);
        let pool = runtime
            .block_on(
                MySqlPoolOptions::new()
                    .max_connections(MAX_CONNECTIONS)
                    .acquire_timeout(CONNECT_TIMEOUT)
                    .connect_with(options),
            )
            .map_err(|err| unavailable(&endpoint, err))?;

        if let Err(err) = runtime.block_on(initialize_mariadb_schema(&pool)) {
            runtime.block_on(pool.close());
            error!(
                "event=store_open module=mariadb status=error endpoint={endpoint} error_code=schema error={err}"
            );
            return Err(err.into());
        }

        info!("event=store_open module=mariadb status=ok endpoint={endpoint}");
        Ok(Self {
            pool,
            runtime,
            endpoint,
        })
    }

    /// `host:port/database` this store is connected to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    async fn row_exists(&self, sql: &str, id: i64) -> StoreResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn topic_title_taken(&self, title: &str, except_id: TopicId) -> StoreResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM Topics WHERE title = ? AND id <> ? LIMIT 1")
                .bind(title)
                .bind(except_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn question_title_taken(
        &self,
        topic_id: TopicId,
        title: &str,
        except_id: QuestionId,
    ) -> StoreResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM Questions WHERE topic_id = ? AND title = ? AND id <> ? LIMIT 1",
        )
        .bind(topic_id)
        .bind(title)
        .bind(except_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    async fn fetch_topics(&self, query: MySqlQuery<'_>) -> StoreResult<Vec<Topic>> {
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(parse_topic_row).collect()
    }

    async fn fetch_questions(&self, query: MySqlQuery<'_>) -> StoreResult<Vec<Question>> {
        let rows = query.fetch_all(&self.pool).await?;
        let mut questions = rows
            .iter()
            .map(parse_question_row)
            .collect::<StoreResult<Vec<_>>>()?;

        for question in &mut questions {
            question.answers = self.fetch_answers(question.id).await?;
        }
        Ok(questions)
    }

    async fn fetch_answers(&self, question_id: QuestionId) -> StoreResult<Vec<Answer>> {
        let rows = sqlx::query(
            "SELECT id, text, is_correct FROM Answers WHERE question_id = ? ORDER BY id",
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(parse_answer_row).collect()
    }

    async fn fetch_results(&self, query: MySqlQuery<'_>) -> StoreResult<Vec<QuizResult>> {
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(parse_result_row).collect()
    }

    async fn topic_by_id(&self, id: TopicId) -> StoreResult<Option<Topic>> {
        let sql = format!("{TOPIC_SELECT_SQL} WHERE t.id = ?");
        let topics = self.fetch_topics(sqlx::query(&sql).bind(id)).await?;
        Ok(topics.into_iter().next())
    }

    async fn question_by_id(&self, id: QuestionId) -> StoreResult<Option<Question>> {
        let sql = format!("{QUESTION_SELECT_SQL} WHERE id = ?");
        let questions = self.fetch_questions(sqlx::query(&sql).bind(id)).await?;
        Ok(questions.into_iter().next())
    }

    async fn put_topic(&self, topic: &Topic) -> StoreResult<Topic> {
        if self.topic_title_taken(&topic.title, topic.id).await? {
            return Err(StoreError::duplicate_title(EntityKind::Topic, &topic.title));
        }

        let id = if topic.is_new() {
            let done = sqlx::query("INSERT INTO Topics (title, description) VALUES (?, ?)")
                .bind(&topic.title)
                .bind(&topic.description)
                .execute(&self.pool)
                .await
                .map_err(|err| map_write_error(err, EntityKind::Topic, &topic.title))?;
            inserted_id(done.last_insert_id())?
        } else {
            if !self.row_exists(TOPIC_EXISTS_SQL, topic.id).await? {
                return Err(StoreError::not_found(EntityKind::Topic, topic.id));
            }
            sqlx::query("UPDATE Topics SET title = ?, description = ? WHERE id = ?")
                .bind(&topic.title)
                .bind(&topic.description)
                .bind(topic.id)
                .execute(&self.pool)
                .await
                .map_err(|err| map_write_error(err, EntityKind::Topic, &topic.title))?;
            topic.id
        };

        self.topic_by_id(id)
            .await?
            .ok_or_else(|| StoreError::not_found(EntityKind::Topic, id))
    }

    async fn remove_topic(&self, id: TopicId) -> StoreResult<()> {
        let done = sqlx::query("DELETE FROM Topics WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::not_found(EntityKind::Topic, id));
        }
        info!("event=topic_delete module=mariadb status=ok topic_id={id}");
        Ok(())
    }

    async fn write_question(&self, question: &Question) -> StoreResult<QuestionId> {
        let mut tx = self.pool.begin().await?;

        let id = if question.is_new() {
            let done = sqlx::query("INSERT INTO Questions (topic_id, title, body) VALUES (?, ?, ?)")
                .bind(question.topic_id)
                .bind(&question.title)
                .bind(&question.body)
                .execute(&mut *tx)
                .await?;
            inserted_id(done.last_insert_id())?
        } else {
            let found: Option<i64> =
                sqlx::query_scalar("SELECT id FROM Questions WHERE id = ? FOR UPDATE")
                    .bind(question.id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if found.is_none() {
                return Err(StoreError::not_found(EntityKind::Question, question.id));
            }
            sqlx::query("UPDATE Questions SET topic_id = ?, title = ?, body = ? WHERE id = ?")
                .bind(question.topic_id)
                .bind(&question.title)
                .bind(&question.body)
                .bind(question.id)
                .execute(&mut *tx)
                .await?;
            question.id
        };

        sqlx::query("DELETE FROM Answers WHERE question_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for answer in &question.answers {
            sqlx::query("INSERT INTO Answers (question_id, text, is_correct) VALUES (?, ?, ?)")
                .bind(id)
                .bind(&answer.text)
                .bind(answer.is_correct)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    async fn put_question(&self, question: &Question) -> StoreResult<Question> {
        if !self.row_exists(TOPIC_EXISTS_SQL, question.topic_id).await? {
            return Err(StoreError::not_found(EntityKind::Topic, question.topic_id));
        }
        if self
            .question_title_taken(question.topic_id, &question.title, question.id)
            .await?
        {
            return Err(StoreError::duplicate_title(
                EntityKind::Question,
                &question.title,
            ));
        }

        let id = match self.write_question(question).await {
            Ok(id) => id,
            Err(StoreError::Persistence(PersistenceError::MariaDb(err))) => {
                return Err(if is_foreign_key_violation(&err) {
                    StoreError::not_found(EntityKind::Topic, question.topic_id)
                } else {
                    map_write_error(err, EntityKind::Question, &question.title)
                });
            }
            Err(err) => return Err(err),
        };

        self.question_by_id(id)
            .await?
            .ok_or_else(|| StoreError::not_found(EntityKind::Question, id))
    }

    async fn remove_question(&self, id: QuestionId) -> StoreResult<()> {
        let done = sqlx::query("DELETE FROM Questions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::not_found(EntityKind::Question, id));
        }
        Ok(())
    }

    async fn put_answer(&self, question_id: QuestionId, answer: &Answer) -> StoreResult<Answer> {
        if !self.row_exists(QUESTION_EXISTS_SQL, question_id).await? {
            return Err(StoreError::not_found(EntityKind::Question, question_id));
        }

        if answer.is_new() {
            let done =
                sqlx::query("INSERT INTO Answers (question_id, text, is_correct) VALUES (?, ?, ?)")
                    .bind(question_id)
                    .bind(&answer.text)
                    .bind(answer.is_correct)
                    .execute(&self.pool)
                    .await?;
            return Ok(Answer {
                id: inserted_id(done.last_insert_id())?,
                text: answer.text.clone(),
                is_correct: answer.is_correct,
            });
        }

        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM Answers WHERE id = ? AND question_id = ?")
                .bind(answer.id)
                .bind(question_id)
                .fetch_optional(&self.pool)
                .await?;
        if found.is_none() {
            return Err(StoreError::not_found(EntityKind::Answer, answer.id));
        }
        sqlx::query("UPDATE Answers SET text = ?, is_correct = ? WHERE id = ?")
            .bind(&answer.text)
            .bind(answer.is_correct)
            .bind(answer.id)
            .execute(&self.pool)
            .await?;
        Ok(answer.clone())
    }

    async fn remove_answer(&self, id: AnswerId) -> StoreResult<()> {
        let done = sqlx::query("DELETE FROM Answers WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::not_found(EntityKind::Answer, id));
        }
        Ok(())
    }

    async fn push_result(&self, result: &QuizResult) -> StoreResult<QuizResult> {
        if !self.row_exists(TOPIC_EXISTS_SQL, result.topic_id).await? {
            return Err(StoreError::not_found(EntityKind::Topic, result.topic_id));
        }
        if !self.row_exists(QUESTION_EXISTS_SQL, result.question_id).await? {
            return Err(StoreError::not_found(
                EntityKind::Question,
                result.question_id,
            ));
        }

        let done = sqlx::query(
            "INSERT INTO QuizResults (
                topic_id,
                question_id,
                is_correct,
                answer_revealed,
                response_time_secs,
                answered_at,
                score
            ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(result.topic_id)
        .bind(result.question_id)
        .bind(result.is_correct)
        .bind(result.answer_revealed)
        .bind(i64::from(result.response_time_secs))
        .bind(result.answered_at)
        .bind(result.score)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                StoreError::not_found(EntityKind::Question, result.question_id)
            } else {
                StoreError::from(err)
            }
        })?;

        let mut saved = result.clone();
        saved.id = inserted_id(done.last_insert_id())?;
        Ok(saved)
    }
}

impl Drop for MariaDbStore {
    fn drop(&mut self) {
        self.runtime.block_on(self.pool.close());
    }
}

impl QuizRepository for MariaDbStore {
    fn list_topics(&self) -> StoreResult<Vec<Topic>> {
        let sql = format!("{TOPIC_SELECT_SQL} ORDER BY t.title, t.id");
        self.block_on(self.fetch_topics(sqlx::query(&sql)))
    }

    fn find_topic(&self, id: TopicId) -> StoreResult<Option<Topic>> {
        self.block_on(self.topic_by_id(id))
    }

    fn find_topic_by_title(&self, title: &str) -> StoreResult<Option<Topic>> {
        let sql = format!("{TOPIC_SELECT_SQL} WHERE t.title = ? LIMIT 1");
        let topics = self.block_on(self.fetch_topics(sqlx::query(&sql).bind(title)))?;
        Ok(topics.into_iter().next())
    }

    fn save_topic(&self, topic: &Topic) -> StoreResult<Topic> {
        log_failed_mutation("topic_save", MODULE, self.block_on(self.put_topic(topic)))
    }

    fn delete_topic(&self, id: TopicId) -> StoreResult<()> {
        log_failed_mutation("topic_delete", MODULE, self.block_on(self.remove_topic(id)))
    }

    fn find_questions_by_topic(&self, topic_id: TopicId) -> StoreResult<Vec<Question>> {
        let sql = format!("{QUESTION_SELECT_SQL} WHERE topic_id = ? ORDER BY title, id");
        self.block_on(self.fetch_questions(sqlx::query(&sql).bind(topic_id)))
    }

    fn find_question(&self, id: QuestionId) -> StoreResult<Option<Question>> {
        self.block_on(self.question_by_id(id))
    }

    fn find_question_by_title(
        &self,
        topic_id: TopicId,
        title: &str,
    ) -> StoreResult<Option<Question>> {
        let sql = format!("{QUESTION_SELECT_SQL} WHERE topic_id = ? AND title = ? LIMIT 1");
        let questions =
            self.block_on(self.fetch_questions(sqlx::query(&sql).bind(topic_id).bind(title)))?;
        Ok(questions.into_iter().next())
    }

    fn save_question(&self, question: &Question) -> StoreResult<Question> {
        log_failed_mutation(
            "question_save",
            MODULE,
            self.block_on(self.put_question(question)),
        )
    }

    fn delete_question(&self, id: QuestionId) -> StoreResult<()> {
        log_failed_mutation(
            "question_delete",
            MODULE,
            self.block_on(self.remove_question(id)),
        )
    }

    fn find_answers_by_question(&self, question_id: QuestionId) -> StoreResult<Vec<Answer>> {
        self.block_on(self.fetch_answers(question_id))
    }

    fn save_answer(&self, question_id: QuestionId, answer: &Answer) -> StoreResult<Answer> {
        log_failed_mutation(
            "answer_save",
            MODULE,
            self.block_on(self.put_answer(question_id, answer)),
        )
    }

    fn delete_answer(&self, id: AnswerId) -> StoreResult<()> {
        log_failed_mutation("answer_delete", MODULE, self.block_on(self.remove_answer(id)))
    }

    fn append_result(&self, result: &QuizResult) -> StoreResult<QuizResult> {
        log_failed_mutation("result_append", MODULE, self.block_on(self.push_result(result)))
    }

    fn find_results_by_topic(&self, topic_id: TopicId) -> StoreResult<Vec<QuizResult>> {
        let sql =
            format!("{RESULT_SELECT_SQL} WHERE topic_id = ? ORDER BY answered_at DESC, id DESC");
        self.block_on(self.fetch_results(sqlx::query(&sql).bind(topic_id)))
    }

    fn find_results_by_question(&self, question_id: QuestionId) -> StoreResult<Vec<QuizResult>> {
        let sql = format!(
            "{RESULT_SELECT_SQL} WHERE question_id = ? ORDER BY answered_at DESC, id DESC"
        );
        self.block_on(self.fetch_results(sqlx::query(&sql).bind(question_id)))
    }
}

fn unavailable(endpoint: &str, err: impl Display) -> StoreError {
    error!(
        "event=store_open module=mariadb status=error endpoint={endpoint} error_code=unavailable error={err}"
    );
    StoreError::Unavailable(format!("mariadb at {endpoint}: {err}"))
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

/// Maps a unique-index violation on a title write to `DuplicateTitle`.
fn map_write_error(err: sqlx::Error, entity: EntityKind, title: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::duplicate_title(entity, title)
        }
        _ => StoreError::from(err),
    }
}

fn inserted_id(raw: u64) -> StoreResult<i64> {
    i64::try_from(raw)
        .map_err(|_| StoreError::InvalidData(format!("generated id `{raw}` exceeds i64")))
}

fn parse_topic_row(row: &MySqlRow) -> StoreResult<Topic> {
    let question_count: i64 = row.try_get("question_count")?;
    let question_count = u32::try_from(question_count).map_err(|_| {
        StoreError::InvalidData(format!(
            "invalid question count `{question_count}` for Topics.id"
        ))
    })?;

    Ok(Topic {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        question_count,
    })
}

fn parse_question_row(row: &MySqlRow) -> StoreResult<Question> {
    Ok(Question {
        id: row.try_get("id")?,
        topic_id: row.try_get("topic_id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        answers: Vec::new(),
    })
}

fn parse_answer_row(row: &MySqlRow) -> StoreResult<Answer> {
    Ok(Answer {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        is_correct: row.try_get("is_correct")?,
    })
}

fn parse_result_row(row: &MySqlRow) -> StoreResult<QuizResult> {
    let response_time_secs: i32 = row.try_get("response_time_secs")?;
    let response_time_secs = u32::try_from(response_time_secs).map_err(|_| {
        StoreError::InvalidData(format!(
            "invalid response time `{response_time_secs}` in QuizResults.response_time_secs"
        ))
    })?;

    Ok(QuizResult {
        id: row.try_get("id")?,
        topic_id: row.try_get("topic_id")?,
        question_id: row.try_get("question_id")?,
        is_correct: row.try_get("is_correct")?,
        answer_revealed: row.try_get("answer_revealed")?,
        response_time_secs,
        answered_at: row.try_get("answered_at")?,
        score: row.try_get("score")?,
    })
}
