//! Domain models for the study companion.
//!
//! # Core Concepts
//!
//! ## Content
//!
//! - [`Document`]: Extracted lecture notes, the scope for studying and progress.
//! - [`Concept`]: A key idea within a document. History is aggregated per concept.
//! - [`Question`]: Immutable prompt/answer pair belonging to one concept.
//!
//! ## Scheduling
//!
//! - [`ReviewState`]: One per question; ease factor, interval, repetitions, due time.
//! - [`ReviewAttempt`]: Append-only log of graded answers (never mutated or deleted).
//!
//! ## Reporting
//!
//! - [`ProgressSummary`]: Accuracy, completion, and a [`RecommendationTier`] per document.

mod concept;
mod document;
mod progress;
mod question;
mod review;

pub use concept::*;
pub use document::*;
pub use progress::*;
pub use question::*;
pub use review::*;
