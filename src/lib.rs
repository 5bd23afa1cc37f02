//! Spaced-repetition scheduling and progress tracking for lecture-note flashcards.
//!
//! Documents are split into concepts, concepts carry questions, and every
//! question has a [`models::ReviewState`] that the [`scheduler::Scheduler`]
//! advances after each graded answer. The [`progress::ProgressAggregator`]
//! turns the accumulated review history into summary statistics.
//!
//! Storage is reached only through the [`store::StudyStore`] trait; the
//! bundled implementation is the SQLite-backed [`db::Database`].

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod grading;
pub mod models;
pub mod progress;
pub mod scheduler;
pub mod store;

pub use error::{Error, Result};
