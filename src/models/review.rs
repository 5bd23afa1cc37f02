use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::question::Question;
use crate::scheduler::{INITIAL_EASE_FACTOR, INITIAL_INTERVAL_DAYS};

/// Per-question spaced-repetition state.
///
/// Created with default values when the question is created and mutated only
/// by recording a review outcome. `ease_factor` never drops below
/// [`MIN_EASE_FACTOR`](crate::scheduler::MIN_EASE_FACTOR) and `repetitions` is
/// zero whenever the latest outcome was a lapse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewState {
    pub question_id: Uuid,
    /// Multiplier controlling how fast intervals grow after successful recall.
    pub ease_factor: f64,
    /// Days until the next review.
    pub interval: u32,
    /// Consecutive successful reviews.
    pub repetitions: u32,
    pub last_reviewed: Option<DateTime<Utc>>,
    /// `None` means never reviewed, which makes the question due immediately.
    pub next_review: Option<DateTime<Utc>>,
}

impl ReviewState {
    pub fn new(question_id: Uuid) -> Self {
        Self {
            question_id,
            ease_factor: INITIAL_EASE_FACTOR,
            interval: INITIAL_INTERVAL_DAYS,
            repetitions: 0,
            last_reviewed: None,
            next_review: None,
        }
    }
}

/// Discretized answer quality driving the schedule update.
///
/// - `Fail` (0): incorrect, score below the partial band
/// - `Partial` (1): incorrect but close
/// - `Success` (2): correct
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Fail,
    Partial,
    Success,
}

impl Quality {
    pub fn value(self) -> u8 {
        match self {
            Self::Fail => 0,
            Self::Partial => 1,
            Self::Success => 2,
        }
    }

    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Fail),
            1 => Some(Self::Partial),
            2 => Some(Self::Success),
            _ => None,
        }
    }
}

/// An append-only record of one graded answer.
///
/// Attempts are aggregated per concept for progress reporting; the question id
/// is kept for traceability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewAttempt {
    pub id: Uuid,
    pub concept_id: Uuid,
    pub question_id: Uuid,
    pub correct: bool,
    pub score: u8,
    pub quality: Quality,
    pub created_at: DateTime<Utc>,
}

/// An already-graded answer, as submitted by the caller.
///
/// `score` is deliberately wider than 0-100 so out-of-range values reach
/// validation instead of failing deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewOutcomeInput {
    pub correct: bool,
    pub score: i64,
}

/// Result of recording a review: the new schedule and the history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub state: ReviewState,
    pub attempt: ReviewAttempt,
}

/// A question together with its due time, as considered by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewCandidate {
    pub question: Question,
    pub next_review: Option<DateTime<Utc>>,
}

impl ReviewCandidate {
    /// Whether the question should be reviewed at `now`. Never-reviewed questions always are.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review.map_or(true, |next| next <= now)
    }
}
