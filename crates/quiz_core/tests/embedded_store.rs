use quiz_core::{
    Answer, EmbeddedConfig, EmbeddedStore, PersistenceError, Question, QuizRepository, QuizResult,
    StoreError, Topic,
};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

fn open(dir: &Path) -> EmbeddedStore {
    EmbeddedStore::open(&EmbeddedConfig::new(dir)).unwrap()
}

fn two_answer_question(topic_id: i64, title: &str) -> Question {
    Question::new(
        topic_id,
        title,
        "body",
        vec![Answer::new("right", true), Answer::new("wrong", false)],
    )
}

#[test]
fn missing_files_open_as_an_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir.path().join("fresh"));

    assert!(store.list_topics().unwrap().is_empty());
    assert!(dir.path().join("fresh").is_dir());
}

#[test]
fn every_mutation_writes_its_collection_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path());

    let topic = store.save_topic(&Topic::new("Java", "intro")).unwrap();
    assert!(dir.path().join("quiz_topics.json").is_file());
    assert!(!dir.path().join("quiz_questions.json").exists());

    store
        .save_question(&two_answer_question(topic.id, "Basics"))
        .unwrap();
    assert!(dir.path().join("quiz_questions.json").is_file());
    assert!(dir.path().join("quiz_answers.json").is_file());

    let written = fs::read_to_string(dir.path().join("quiz_topics.json")).unwrap();
    assert!(written.contains("\"Java\""));
}

#[test]
fn file_prefix_names_the_collection_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = EmbeddedConfig {
        dir: dir.path().to_path_buf(),
        file_prefix: "trivia".to_string(),
    };
    let store = EmbeddedStore::open(&config).unwrap();
    store.save_topic(&Topic::new("Java", "intro")).unwrap();

    assert!(dir.path().join("trivia_topics.json").is_file());
}

#[test]
fn reopened_store_sees_data_and_resumes_identifiers() {
    let dir = tempfile::tempdir().unwrap();
    let (topic, question) = {
        let store = open(dir.path());
        let topic = store.save_topic(&Topic::new("Java", "intro")).unwrap();
        store.save_topic(&Topic::new("Rust", "systems")).unwrap();
        let question = store
            .save_question(&two_answer_question(topic.id, "Basics"))
            .unwrap();
        store
            .append_result(&QuizResult::new(topic.id, question.id, true, false, 9, 3, 100))
            .unwrap();
        (topic, question)
    };

    let reopened = open(dir.path());
    assert_eq!(reopened.list_topics().unwrap().len(), 2);
    assert_eq!(reopened.find_topic(topic.id).unwrap().unwrap().question_count, 1);
    assert_eq!(reopened.find_question(question.id).unwrap(), Some(question.clone()));
    assert_eq!(reopened.find_results_by_topic(topic.id).unwrap().len(), 1);

    let next_topic = reopened.save_topic(&Topic::new("Go", "gophers")).unwrap();
    assert_eq!(next_topic.id, 3);
    let next_question = reopened
        .save_question(&two_answer_question(topic.id, "Generics"))
        .unwrap();
    assert_eq!(next_question.id, question.id + 1);
    let max_old_answer = question.answers.iter().map(|answer| answer.id).max().unwrap();
    assert!(next_question.answers.iter().all(|answer| answer.id > max_old_answer));
}

#[test]
fn concurrent_creates_get_distinct_sequential_ids() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path());
    store.save_topic(&Topic::new("Prior", "existing")).unwrap();

    let (a, b) = thread::scope(|scope| {
        let a = scope.spawn(|| store.save_topic(&Topic::new("B", "second")).unwrap());
        let b = scope.spawn(|| store.save_topic(&Topic::new("A", "first")).unwrap());
        (a.join().unwrap(), b.join().unwrap())
    });

    let ids: HashSet<i64> = [a.id, b.id].into_iter().collect();
    assert_eq!(ids, HashSet::from([2, 3]));

    let titles: Vec<String> = store
        .list_topics()
        .unwrap()
        .into_iter()
        .map(|topic| topic.title)
        .collect();
    assert_eq!(titles, ["A", "B", "Prior"]);
}

#[test]
fn many_threads_never_share_an_identifier() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path());
    let topic = store.save_topic(&Topic::new("Load", "many writers")).unwrap();

    let ids: Vec<i64> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = &store;
                scope.spawn(move || {
                    (0..10)
                        .map(|index| {
                            store
                                .save_question(&two_answer_question(
                                    topic.id,
                                    &format!("q-{worker}-{index}"),
                                ))
                                .unwrap()
                                .id
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect()
    });

    let unique: HashSet<i64> = ids.iter().copied().collect();
    assert_eq!(unique.len(), 80);
    assert_eq!(store.find_questions_by_topic(topic.id).unwrap().len(), 80);
}

#[test]
fn readers_never_observe_a_half_applied_cascade() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path());
    let topic = store.save_topic(&Topic::new("Doomed", "cascade")).unwrap();
    for index in 0..20 {
        store
            .save_question(&two_answer_question(topic.id, &format!("q{index}")))
            .unwrap();
    }

    let deleted = AtomicBool::new(false);
    thread::scope(|scope| {
        let reader = scope.spawn(|| {
            loop {
                let finished = deleted.load(Ordering::SeqCst);
                let questions = store.find_questions_by_topic(topic.id).unwrap();
                assert!(questions.len() == 20 || questions.is_empty());
                assert!(questions.iter().all(|question| question.answers.len() == 2));
                if finished {
                    assert!(questions.is_empty());
                    break;
                }
            }
        });

        store.delete_topic(topic.id).unwrap();
        deleted.store(true, Ordering::SeqCst);
        reader.join().unwrap();
    });

    assert!(store.list_topics().unwrap().is_empty());
}

#[test]
fn failed_write_is_reported_but_stays_applied_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    let store_dir = dir.path().join("store");
    let store = open(&store_dir);
    fs::remove_dir_all(&store_dir).unwrap();

    let error = store.save_topic(&Topic::new("Java", "intro")).unwrap_err();
    assert!(matches!(
        error,
        StoreError::Persistence(PersistenceError::Io { .. })
    ));
    assert!(store.topic_title_exists("java").unwrap());
}

#[test]
fn corrupt_collection_file_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("quiz_questions.json"), "{ not json").unwrap();

    let error = EmbeddedStore::open(&EmbeddedConfig::new(dir.path())).unwrap_err();
    assert!(matches!(
        error,
        StoreError::Persistence(PersistenceError::Serialization { .. })
    ));
}

#[test]
fn leftover_temp_files_do_not_disturb_reopening() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open(dir.path());
        store.save_topic(&Topic::new("Java", "intro")).unwrap();
        store.save_topic(&Topic::new("Rust", "systems")).unwrap();
    }
    fs::write(dir.path().join(".tmpAbC123"), "[\n  {\n    \"id\": 3,").unwrap();

    let reopened = open(dir.path());
    let titles: Vec<String> = reopened
        .list_topics()
        .unwrap()
        .into_iter()
        .map(|topic| topic.title)
        .collect();
    assert_eq!(titles, ["Java", "Rust"]);
}

#[cfg(unix)]
#[test]
fn failed_write_keeps_the_previous_collection_file() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let store_dir = dir.path().join("store");
    let store = open(&store_dir);
    store.save_topic(&Topic::new("Java", "intro")).unwrap();
    let topics_path = store_dir.join("quiz_topics.json");
    let before = fs::read_to_string(&topics_path).unwrap();

    fs::set_permissions(&store_dir, fs::Permissions::from_mode(0o555)).unwrap();
    let permissions_enforced = fs::write(store_dir.join("write_check"), "").is_err();
    let outcome = store.save_topic(&Topic::new("Rust", "systems"));
    fs::set_permissions(&store_dir, fs::Permissions::from_mode(0o755)).unwrap();
    if !permissions_enforced {
        // Privileged users ignore directory permission bits.
        return;
    }

    assert!(matches!(
        outcome,
        Err(StoreError::Persistence(PersistenceError::Io { .. }))
    ));
    assert_eq!(fs::read_to_string(&topics_path).unwrap(), before);
    let reopened = open(&store_dir);
    assert_eq!(reopened.list_topics().unwrap().len(), 1);
}
