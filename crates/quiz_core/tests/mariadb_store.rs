use quiz_core::{
    now_epoch_ms, Answer, EntityKind, MariaDbConfig, MariaDbStore, Question, QuizRepository,
    QuizResult, StoreError, Topic,
};
use std::env;

fn unreachable_server() -> MariaDbConfig {
    MariaDbConfig {
        host: "127.0.0.1".to_string(),
        port: 1,
        ..MariaDbConfig::default()
    }
}

/// Server settings from `QUIZ_TEST_MARIADB_*`, or `None` when no server is provided.
fn live_server() -> Option<MariaDbConfig> {
    let host = env::var("QUIZ_TEST_MARIADB_HOST").ok()?;
    let defaults = MariaDbConfig::default();
    Some(MariaDbConfig {
        host,
        port: env::var("QUIZ_TEST_MARIADB_PORT")
            .ok()
            .and_then(|port| port.parse().ok())
            .unwrap_or(defaults.port),
        database: env::var("QUIZ_TEST_MARIADB_DATABASE").unwrap_or(defaults.database),
        user: env::var("QUIZ_TEST_MARIADB_USER").unwrap_or(defaults.user),
        password: env::var("QUIZ_TEST_MARIADB_PASSWORD").unwrap_or(defaults.password),
    })
}

#[test]
fn unreachable_server_is_unavailable() {
    let error = MariaDbStore::open(&unreachable_server()).err().unwrap();

    assert!(matches!(error, StoreError::Unavailable(_)));
    assert_eq!(error.code(), "unavailable");
    assert!(error.to_string().contains("127.0.0.1:1/quiz_db"));
}

#[test]
fn live_server_honors_the_repository_contract() {
    let Some(config) = live_server() else {
        return;
    };
    let store = MariaDbStore::open(&config).unwrap();
    assert_eq!(store.endpoint(), format!("{}:{}/{}", config.host, config.port, config.database));

    // Titles carry a run marker so repeated runs against one database never collide.
    let marker = now_epoch_ms();
    let title = format!("Java {marker}");
    let topic = store.save_topic(&Topic::new(title.as_str(), "intro")).unwrap();
    assert!(topic.id > 0);
    assert_eq!(topic.question_count, 0);

    let duplicate = store
        .save_topic(&Topic::new(title.to_uppercase(), "again"))
        .unwrap_err();
    assert!(matches!(
        duplicate,
        StoreError::DuplicateTitle {
            entity: EntityKind::Topic,
            ..
        }
    ));
    assert_eq!(
        store.find_topic_by_title(&title.to_lowercase()).unwrap(),
        Some(topic.clone())
    );

    let question = store
        .save_question(&Question::new(
            topic.id,
            "Basics",
            "What is Java?",
            vec![Answer::new("A language", true), Answer::new("An OS", false)],
        ))
        .unwrap();
    assert_eq!(question.answers.len(), 2);
    assert_eq!(store.find_topic(topic.id).unwrap().unwrap().question_count, 1);

    let mut replacement = question.clone();
    replacement.answers = vec![Answer::new("A platform", true)];
    let updated = store.save_question(&replacement).unwrap();
    assert_eq!(updated.answers.len(), 1);
    assert!(updated.answers[0].id > question.answers[1].id);

    let orphan = store
        .save_question(&Question::new(-1, "Orphan", "body", vec![]))
        .unwrap_err();
    assert!(matches!(orphan, StoreError::NotFound { .. }));

    let older = store
        .append_result(&QuizResult::new(topic.id, question.id, true, false, 10, 5, 1_000))
        .unwrap();
    let newer = store
        .append_result(&QuizResult::new(topic.id, question.id, false, true, 20, 0, 2_000))
        .unwrap();
    assert_eq!(
        store.find_results_by_topic(topic.id).unwrap(),
        vec![newer, older]
    );

    let statistics = store.statistics_by_topic(topic.id).unwrap();
    assert_eq!(statistics.len(), 1);
    assert_eq!(statistics[0].attempts, 2);

    store.delete_topic(topic.id).unwrap();
    assert!(store.find_question(question.id).unwrap().is_none());
    assert!(store.find_results_by_question(question.id).unwrap().is_empty());
    assert!(matches!(
        store.delete_topic(topic.id),
        Err(StoreError::NotFound { .. })
    ));

    let next = store.save_topic(&Topic::new(title.as_str(), "again")).unwrap();
    assert!(next.id > topic.id);
    store.delete_topic(next.id).unwrap();
}
