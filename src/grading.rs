//! Seam for the external answer-grading service.
//!
//! The scheduler never decides correctness itself; a [`Grader`] compares a
//! free-text answer with the reference answer and reports a verdict and score.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::ReviewOutcome;

/// Verdict returned by a grader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evaluation {
    pub is_correct: bool,
    /// 0-100. Values outside that range are rejected when the review is recorded.
    pub score: i64,
    pub feedback: String,
}

/// Grades a user's answer against a question's reference answer.
///
/// Implementations report their own failures as [`Error::Grading`](crate::Error::Grading).
pub trait Grader {
    fn grade(&self, prompt: &str, answer: &str, reference_answer: &str) -> Result<Evaluation>;
}

impl<F> Grader for F
where
    F: Fn(&str, &str, &str) -> Result<Evaluation>,
{
    fn grade(&self, prompt: &str, answer: &str, reference_answer: &str) -> Result<Evaluation> {
        self(prompt, answer, reference_answer)
    }
}

/// What the user sees after submitting an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerFeedback {
    pub evaluation: Evaluation,
    pub correct_answer: String,
    pub outcome: ReviewOutcome,
}
