//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open the configured quiz store through the store selector.
//! - Print the active backend and topic/question counts.
//!
//! Usage: `quiz_cli [config.toml]`

use log::error;
use quiz_core::{init_logging_from_config, load_config, QuizConfig, QuizRepository, StoreSelector};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);

    let config = match load_config(config_path.as_deref()) {
        Ok(Some(config)) => config,
        Ok(None) => QuizConfig::default(),
        Err(err) => {
            eprintln!("quiz_cli: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = init_logging_from_config(&config.logging) {
        eprintln!("quiz_cli: logging disabled: {err}");
    }

    let store = match StoreSelector::new(config).open() {
        Ok(store) => store,
        Err(err) => {
            error!("event=cli_open module=cli status=error error={err}");
            eprintln!("quiz_cli: {err}");
            return ExitCode::FAILURE;
        }
    };

    let topics = match store.list_topics() {
        Ok(topics) => topics,
        Err(err) => {
            eprintln!("quiz_cli: {err}");
            return ExitCode::FAILURE;
        }
    };
    let questions: u64 = topics.iter().map(|topic| u64::from(topic.question_count)).sum();

    println!("quiz_core version={}", quiz_core::core_version());
    println!("backend={}", store.backend_name());
    println!("topics={} questions={}", topics.len(), questions);
    ExitCode::SUCCESS
}
