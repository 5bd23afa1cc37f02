//! Progress statistics per document.

use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::models::*;
use crate::store::StudyStore;

/// Nominal number of questions generated per concept.
///
/// Completion is measured against this quota rather than the actual question
/// count, so concepts with fewer questions under-report completion.
pub const QUESTIONS_PER_CONCEPT: u64 = 5;

/// Minimum accuracy for [`RecommendationTier::Strong`].
pub const STRONG_ACCURACY: u32 = 80;
/// Minimum accuracy for [`RecommendationTier::Developing`].
pub const DEVELOPING_ACCURACY: u32 = 60;

fn rounded_percentage(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 / whole as f64 * 100.0).round() as u32
}

pub fn accuracy(correct: u64, reviewed: u64) -> u32 {
    rounded_percentage(correct, reviewed)
}

/// Share of the nominal quota (`total_concepts * questions_per_concept`) that has been attempted.
pub fn completion_percentage(reviewed: u64, total_concepts: u64, questions_per_concept: u64) -> u32 {
    rounded_percentage(reviewed, total_concepts * questions_per_concept)
}

pub fn recommendation_for(reviewed: u64, accuracy: u32) -> RecommendationTier {
    if reviewed == 0 {
        RecommendationTier::NotStarted
    } else if accuracy >= STRONG_ACCURACY {
        RecommendationTier::Strong
    } else if accuracy >= DEVELOPING_ACCURACY {
        RecommendationTier::Developing
    } else {
        RecommendationTier::NeedsWork
    }
}

/// Build a summary from raw counts.
pub fn summarize(
    document_id: Uuid,
    total_concepts: u64,
    counts: AttemptCounts,
    questions_per_concept: u64,
) -> ProgressSummary {
    let accuracy = accuracy(counts.correct, counts.total);

    ProgressSummary {
        document_id,
        total_concepts,
        reviewed: counts.total,
        correct: counts.correct,
        incorrect: counts.incorrect,
        accuracy,
        completion_percentage: completion_percentage(
            counts.total,
            total_concepts,
            questions_per_concept,
        ),
        recommendation: recommendation_for(counts.total, accuracy),
    }
}

/// Reads review history through a [`StudyStore`] and reports progress.
#[derive(Clone)]
pub struct ProgressAggregator<S> {
    store: S,
    questions_per_concept: u64,
}

impl<S: StudyStore> ProgressAggregator<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, &SchedulerConfig::default())
    }

    pub fn with_config(store: S, config: &SchedulerConfig) -> Self {
        Self {
            store,
            questions_per_concept: config.questions_per_concept,
        }
    }

    pub fn compute_progress(&self, document_id: Uuid) -> Result<ProgressSummary> {
        if !self.store.document_exists(document_id)? {
            return Err(Error::not_found("document", document_id));
        }

        let total_concepts = self.store.concept_count(document_id)?;
        let counts = self.store.attempt_counts(document_id)?;

        Ok(summarize(
            document_id,
            total_concepts,
            counts,
            self.questions_per_concept,
        ))
    }
}
