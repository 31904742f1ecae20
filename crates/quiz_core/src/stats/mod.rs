//! Statistics derived from quiz results.
//!
//! # Responsibility
//! - Fold quiz results into per-question, per-topic and global aggregates.
//! - Stay independent from any store backend.
//!
//! # Invariants
//! - Batch and incremental aggregation over the same results are equal.
//! - Statistics are never persisted.

pub mod statistic;

pub use statistic::{summarize_all, summarize_topic, Statistic, ALL_TOPICS_LABEL};
