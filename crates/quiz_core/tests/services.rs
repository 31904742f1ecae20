use quiz_core::service::question_service::QuestionDraft;
use quiz_core::service::result_service::AnswerOutcome;
use quiz_core::{
    Answer, EmbeddedConfig, EmbeddedStore, QuestionService, QuizResultService, RelationalStore,
    ServiceError, StoreError, TopicService, ValidationError, ALL_TOPICS_LABEL,
};

fn draft(topic_id: i64, title: &str) -> QuestionDraft {
    QuestionDraft::new(
        topic_id,
        title,
        "What is Java?",
        vec![
            Answer::new("A language", true),
            Answer::new("An OS", false),
            Answer::new("", false),
        ],
    )
}

fn outcome(
    topic_id: i64,
    question_id: i64,
    correct: bool,
    secs: u32,
    score: i32,
) -> AnswerOutcome {
    AnswerOutcome {
        topic_id,
        question_id,
        is_correct: correct,
        answer_revealed: false,
        response_time_secs: secs,
        score,
    }
}

#[test]
fn topic_service_validates_and_prechecks_titles() {
    let store = RelationalStore::open_in_memory().unwrap();
    let topics = TopicService::new(&store);

    let java = topics.create_topic("  Java ", "intro").unwrap();
    assert_eq!(java.title, "Java");

    let duplicate = topics.create_topic("java", "again").unwrap_err();
    assert!(duplicate.is_duplicate_title());

    let blank = topics.create_topic(" ", "intro").unwrap_err();
    assert!(matches!(
        blank,
        ServiceError::Validation(ValidationError::BlankTitle(_))
    ));

    let rust = topics.create_topic("Rust", "systems").unwrap();
    let clash = topics.update_topic(rust.id, "JAVA", "renamed").unwrap_err();
    assert!(clash.is_duplicate_title());

    let updated = topics.update_topic(rust.id, "rust", "lowercase").unwrap();
    assert_eq!(updated.title, "rust");
    assert_eq!(topics.list_topics().unwrap().len(), 2);

    assert!(topics.update_topic(99, "Go", "missing").unwrap_err().is_not_found());
    topics.delete_topic(java.id).unwrap();
    assert!(topics.find_topic(java.id).unwrap().is_none());
}

#[test]
fn question_service_drops_empty_slots_and_checks_titles() {
    let dir = tempfile::tempdir().unwrap();
    let store = EmbeddedStore::open(&EmbeddedConfig::new(dir.path())).unwrap();
    let topic = TopicService::new(&store).create_topic("Java", "intro").unwrap();
    let questions = QuestionService::new(&store);

    let created = questions.create_question(&draft(topic.id, "Basics")).unwrap();
    assert_eq!(created.answers.len(), 2);

    let duplicate = questions
        .create_question(&draft(topic.id, "BASICS"))
        .unwrap_err();
    assert!(duplicate.is_duplicate_title());

    let mut no_correct = draft(topic.id, "Other");
    no_correct.answers = vec![Answer::new("wrong", false)];
    assert!(matches!(
        questions.create_question(&no_correct),
        Err(ServiceError::Validation(ValidationError::NoCorrectAnswer))
    ));

    let missing_topic = questions.create_question(&draft(99, "Orphan")).unwrap_err();
    assert!(missing_topic.is_not_found());

    let mut replacement = draft(topic.id, "Basics");
    replacement.answers = vec![Answer::new("A platform", true)];
    let updated = questions.update_question(created.id, &replacement).unwrap();
    assert_eq!(updated.answers.len(), 1);
    assert_eq!(
        questions.questions_of_topic_title(" java ").unwrap(),
        vec![updated]
    );
}

#[test]
fn result_service_records_and_summarizes() {
    let store = RelationalStore::open_in_memory().unwrap();
    let topic = TopicService::new(&store).create_topic("Java", "intro").unwrap();
    let question = QuestionService::new(&store)
        .create_question(&draft(topic.id, "Basics"))
        .unwrap();
    let results = QuizResultService::new(&store);

    let recorded = results
        .record_result(&outcome(topic.id, question.id, true, 10, 5))
        .unwrap();
    assert!(recorded.id > 0);
    assert!(recorded.answered_at > 0);
    results
        .record_result_at(&outcome(topic.id, question.id, false, 20, 0), 1)
        .unwrap();
    results
        .record_result_at(&outcome(topic.id, question.id, true, 15, 8), 2)
        .unwrap();

    let summary = results.topic_summary(topic.id).unwrap();
    assert_eq!(summary.topic_title, "Java");
    assert_eq!(summary.attempts, 3);
    assert_eq!(summary.average_score, 4);
    assert_eq!(summary.best_score, 8);

    let overall = results.overall_summary().unwrap();
    assert_eq!(overall.topic_title, ALL_TOPICS_LABEL);
    assert_eq!(overall.attempts, 3);

    assert_eq!(results.question_statistics(topic.id).unwrap().len(), 1);
    assert_eq!(results.results_of_question(question.id).unwrap()[0], recorded);

    let orphan = results
        .record_result(&outcome(topic.id, 404, true, 1, 1))
        .unwrap_err();
    assert!(matches!(orphan, ServiceError::Store(StoreError::NotFound { .. })));
}
