use quiz_core::config::{load_config, EmbeddedConfig, MariaDbConfig, SqliteSection};
use quiz_core::{QuizConfig, QuizRepository, QuizStore, StoreError, StoreSelector, Topic};
use std::fs;
use std::path::Path;

fn config_in(dir: &Path) -> QuizConfig {
    QuizConfig {
        embedded: EmbeddedConfig::new(dir.join("embedded")),
        sqlite: SqliteSection {
            file: Some(dir.join("quiz_test.db")),
        },
        mariadb: MariaDbConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..MariaDbConfig::default()
        },
        ..QuizConfig::default()
    }
}

#[test]
fn local_environment_opens_the_embedded_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = StoreSelector::new(config_in(dir.path())).open().unwrap();

    assert!(store.is_embedded());
    assert_eq!(store.backend_name(), "embedded");
    store.save_topic(&Topic::new("Java", "intro")).unwrap();
    assert!(dir.path().join("embedded").join("quiz_topics.json").is_file());
}

#[test]
fn sqlite_backend_is_opened_when_reachable() {
    let dir = tempfile::tempdir().unwrap();
    let selector = StoreSelector::new(config_in(dir.path()));
    let store = selector.resolve(Some("sqlite"), "testing").unwrap();

    assert!(matches!(store, QuizStore::Relational(_)));
    assert_eq!(store.backend_name(), "sqlite");
    store.save_topic(&Topic::new("Java", "intro")).unwrap();
    assert!(dir.path().join("quiz_test.db").is_file());
}

#[test]
fn production_falls_back_to_embedded_when_mariadb_is_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    let selector = StoreSelector::new(config_in(dir.path()));

    let direct = QuizStore::open(&selector.config().resolve_backend(None, "production").unwrap());
    assert!(matches!(direct, Err(StoreError::Unavailable(_))));

    let store = selector.resolve(None, "production").unwrap();
    assert!(store.is_embedded());
    assert!(store.list_topics().unwrap().is_empty());
}

#[test]
fn unknown_names_fall_back_to_embedded() {
    let dir = tempfile::tempdir().unwrap();
    let selector = StoreSelector::new(config_in(dir.path()));

    assert!(selector.resolve(Some("oracle"), "local").unwrap().is_embedded());
    assert!(selector.resolve(None, "staging").unwrap().is_embedded());
}

#[test]
fn broken_sqlite_path_falls_back_to_embedded() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.sqlite.file = Some(dir.path().join("missing").join("nested").join("quiz.db"));

    let store = StoreSelector::new(config)
        .resolve(Some("sqlite"), "development")
        .unwrap();
    assert!(store.is_embedded());
}

#[test]
fn failing_embedded_fallback_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, "file").unwrap();

    let mut config = config_in(dir.path());
    config.embedded = EmbeddedConfig::new(&blocker);
    let selector = StoreSelector::new(config);

    let error = selector.resolve(Some("mariadb"), "production").err().unwrap();
    assert!(matches!(error, StoreError::Persistence(_)));

    let error = selector.open().err().unwrap();
    assert!(matches!(error, StoreError::Persistence(_)));
}

#[test]
fn toml_config_drives_backend_selection() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("dev.db");
    let config_path = dir.path().join("quiz.toml");
    fs::write(
        &config_path,
        format!(
            "environment = \"dev\"\n\n[sqlite]\nfile = {:?}\n",
            db_path.to_str().unwrap()
        ),
    )
    .unwrap();

    let config = load_config(Some(&config_path)).unwrap().unwrap();
    let store = StoreSelector::new(config).open().unwrap();
    assert_eq!(store.backend_name(), "sqlite");
    assert!(db_path.is_file());
}
