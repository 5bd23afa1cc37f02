//! SM-2 family review scheduler.
//!
//! Each question carries a [`ReviewState`]. After a graded answer the state is
//! advanced as follows:
//! - The boolean verdict and 0-100 score collapse into a three-level [`Quality`]
//! - The ease factor moves by the SM-2 formula evaluated on a five-level scale,
//!   never falling below [`MIN_EASE_FACTOR`]
//! - Qualities below the configured lapse threshold reset interval and repetitions
//! - Otherwise the interval grows: 1 day, then 3 days, then `interval * ease`
//!
//! With the default lapse threshold every outcome on the three-level scale
//! lapses, so intervals stay at one day and only the ease factor moves.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::grading::{AnswerFeedback, Grader};
use crate::models::*;
use crate::store::StudyStore;

pub const INITIAL_EASE_FACTOR: f64 = 2.5;
pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const INITIAL_INTERVAL_DAYS: u32 = 1;

/// SM-2 ease update: `ease + (BONUS - d * (LINEAR + d * QUADRATIC))` with `d = MAX_QUALITY_SCALE - q`.
pub const EASE_BONUS: f64 = 0.1;
pub const EASE_LINEAR_PENALTY: f64 = 0.08;
pub const EASE_QUADRATIC_PENALTY: f64 = 0.02;
pub const MAX_QUALITY_SCALE: f64 = 5.0;

/// Scores at or above this count as a full success.
pub const SUCCESS_SCORE: u8 = 80;
/// Scores at or above this (and below [`SUCCESS_SCORE`]) count as partial recall.
pub const PARTIAL_SCORE: u8 = 60;
pub const MAX_SCORE: i64 = 100;

/// Lapse threshold from the five-level SM-2 scale. Every three-level quality falls below it.
pub const LITERAL_LAPSE_THRESHOLD: u8 = 3;
/// Lapse threshold rescaled to the three-level quality scale; only [`Quality::Success`] passes.
pub const RENORMALIZED_LAPSE_THRESHOLD: u8 = 2;

/// Interval after the first and second consecutive successful review.
const FIRST_SUCCESS_INTERVAL_DAYS: u32 = 1;
const SECOND_SUCCESS_INTERVAL_DAYS: u32 = 3;

/// Upper bound on a grown interval. Keeps `next_review` well inside the representable date range.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// Map a grader verdict to a quality level. A correct verdict always counts as success.
pub fn quality_for(correct: bool, score: u8) -> Quality {
    if correct || score >= SUCCESS_SCORE {
        Quality::Success
    } else if score >= PARTIAL_SCORE {
        Quality::Partial
    } else {
        Quality::Fail
    }
}

/// Apply the SM-2 ease update for `quality`, clamped at [`MIN_EASE_FACTOR`].
pub fn next_ease_factor(ease_factor: f64, quality: Quality) -> f64 {
    let distance = MAX_QUALITY_SCALE - f64::from(quality.value());
    let delta = EASE_BONUS - distance * (EASE_LINEAR_PENALTY + distance * EASE_QUADRATIC_PENALTY);
    (ease_factor + delta).max(MIN_EASE_FACTOR)
}

/// Compute the state that follows `state` after a review of the given quality at `now`.
pub fn next_state(
    state: &ReviewState,
    quality: Quality,
    config: &SchedulerConfig,
    now: DateTime<Utc>,
) -> ReviewState {
    let ease_factor = next_ease_factor(state.ease_factor, quality);

    let (interval, repetitions) = if quality.value() < config.lapse_threshold {
        (INITIAL_INTERVAL_DAYS, 0)
    } else {
        let repetitions = state.repetitions + 1;
        let interval = match repetitions {
            1 => FIRST_SUCCESS_INTERVAL_DAYS,
            2 => SECOND_SUCCESS_INTERVAL_DAYS,
            _ => grown_interval(state.interval, ease_factor),
        };
        (interval, repetitions)
    };

    ReviewState {
        question_id: state.question_id,
        ease_factor,
        interval,
        repetitions,
        last_reviewed: Some(now),
        next_review: Some(now + Duration::days(i64::from(interval))),
    }
}

fn grown_interval(interval: u32, ease_factor: f64) -> u32 {
    let grown = (f64::from(interval) * ease_factor).round();
    grown.clamp(1.0, f64::from(MAX_INTERVAL_DAYS)) as u32
}

fn validate_score(score: i64) -> Result<u8> {
    if (0..=MAX_SCORE).contains(&score) {
        Ok(score as u8)
    } else {
        Err(Error::InvalidArgument(format!(
            "score must be between 0 and {}, got {}",
            MAX_SCORE, score
        )))
    }
}

/// Picks the next question to study and records graded reviews.
///
/// Cloning is cheap; clones share the random source used for tie-breaks.
#[derive(Clone)]
pub struct Scheduler<S> {
    store: S,
    config: SchedulerConfig,
    rng: Arc<Mutex<StdRng>>,
}

impl<S: StudyStore> Scheduler<S> {
    pub fn new(store: S) -> Self {
        Self::with_rng(store, StdRng::from_entropy())
    }

    /// Deterministic tie-breaking, for tests and reproducible sessions.
    pub fn with_seed(store: S, seed: u64) -> Self {
        Self::with_rng(store, StdRng::seed_from_u64(seed))
    }

    fn with_rng(store: S, rng: StdRng) -> Self {
        Self {
            store,
            config: SchedulerConfig::default(),
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn ensure_document(&self, document_id: Uuid) -> Result<()> {
        if self.store.document_exists(document_id)? {
            Ok(())
        } else {
            Err(Error::not_found("document", document_id))
        }
    }

    /// The question of `document_id` with the earliest due time.
    ///
    /// Never-reviewed questions come before any scheduled one. Ties are broken
    /// at random so the same question is not always served first.
    pub fn pick_next_due(&self, document_id: Uuid) -> Result<Option<Question>> {
        self.ensure_document(document_id)?;

        let candidates = self.store.review_candidates(document_id)?;
        let Some(earliest) = candidates.iter().map(|c| c.next_review).min() else {
            tracing::debug!("No questions available for document {}", document_id);
            return Ok(None);
        };

        let tied: Vec<&ReviewCandidate> = candidates
            .iter()
            .filter(|c| c.next_review == earliest)
            .collect();

        let mut rng = self.rng.lock().expect("scheduler rng lock poisoned");
        let picked = tied.choose(&mut *rng).map(|c| c.question.clone());

        if let Some(question) = &picked {
            tracing::debug!(
                "Picked question {} for document {} ({} tied of {})",
                question.id,
                document_id,
                tied.len(),
                candidates.len()
            );
        }

        Ok(picked)
    }

    /// Questions of `document_id` that are due at `now`, in pick order.
    pub fn due_questions(&self, document_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Question>> {
        self.ensure_document(document_id)?;

        let mut due: Vec<ReviewCandidate> = self
            .store
            .review_candidates(document_id)?
            .into_iter()
            .filter(|c| c.is_due(now))
            .collect();
        due.sort_by_key(|c| c.next_review);

        Ok(due.into_iter().map(|c| c.question).collect())
    }

    pub fn review_state(&self, question_id: Uuid) -> Result<ReviewState> {
        self.store
            .review_state(question_id)?
            .ok_or_else(|| Error::not_found("question", question_id))
    }

    /// Record a graded answer now. See [`Scheduler::record_review_at`].
    pub fn record_review(&self, question_id: Uuid, correct: bool, score: i64) -> Result<ReviewOutcome> {
        self.record_review_at(question_id, correct, score, Utc::now())
    }

    /// Advance the question's schedule from a graded answer and append a history entry.
    ///
    /// The state update and the attempt are persisted together. An out-of-range
    /// score or an unknown question writes nothing.
    pub fn record_review_at(
        &self,
        question_id: Uuid,
        correct: bool,
        score: i64,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome> {
        let score = validate_score(score)?;
        let quality = quality_for(correct, score);
        let config = &self.config;

        let outcome = self
            .store
            .apply_review(question_id, &|question: &Question, state: &ReviewState| {
                ReviewOutcome {
                    state: next_state(state, quality, config, now),
                    attempt: ReviewAttempt {
                        id: Uuid::new_v4(),
                        concept_id: question.concept_id,
                        question_id: question.id,
                        correct,
                        score,
                        quality,
                        created_at: now,
                    },
                }
            })?
            .ok_or_else(|| Error::not_found("question", question_id))?;

        tracing::debug!(
            "Recorded review of question {}: quality {}, ease {:.2}, next in {} day(s)",
            question_id,
            quality.value(),
            outcome.state.ease_factor,
            outcome.state.interval
        );

        Ok(outcome)
    }

    /// Grade a free-text answer with `grader`, then record the outcome.
    ///
    /// Nothing is recorded if the answer is blank or grading fails.
    pub fn submit_answer<G: Grader + ?Sized>(
        &self,
        question_id: Uuid,
        answer: &str,
        grader: &G,
    ) -> Result<AnswerFeedback> {
        if answer.trim().is_empty() {
            return Err(Error::InvalidArgument("answer must not be empty".to_string()));
        }

        let question = self
            .store
            .question(question_id)?
            .ok_or_else(|| Error::not_found("question", question_id))?;

        let evaluation = grader.grade(&question.prompt, answer, &question.answer)?;
        let outcome = self.record_review(question_id, evaluation.is_correct, evaluation.score)?;

        Ok(AnswerFeedback {
            evaluation,
            correct_answer: question.answer,
            outcome,
        })
    }
}
