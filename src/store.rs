//! Persistence seam used by the scheduler and the progress aggregator.

use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

/// Storage operations the scheduling core depends on.
///
/// Implementations own transactions: [`StudyStore::apply_review`] must persist
/// the new review state and the history entry as one unit, and must serialize
/// concurrent reviews of the same question.
pub trait StudyStore {
    fn document_exists(&self, document_id: Uuid) -> Result<bool>;

    fn concept_ids_for_document(&self, document_id: Uuid) -> Result<Vec<Uuid>>;

    fn concept_count(&self, document_id: Uuid) -> Result<u64> {
        Ok(self.concept_ids_for_document(document_id)?.len() as u64)
    }

    fn question_ids_for_concept(&self, concept_id: Uuid) -> Result<Vec<Uuid>>;

    fn question(&self, question_id: Uuid) -> Result<Option<Question>>;

    fn review_state(&self, question_id: Uuid) -> Result<Option<ReviewState>>;

    /// Read the question and its state, let `update` compute the outcome, then
    /// write the new state and append the attempt atomically.
    ///
    /// Returns `Ok(None)` without writing anything if the question does not exist.
    fn apply_review(
        &self,
        question_id: Uuid,
        update: &dyn Fn(&Question, &ReviewState) -> ReviewOutcome,
    ) -> Result<Option<ReviewOutcome>>;

    /// Attempt counts across every concept of the document.
    fn attempt_counts(&self, document_id: Uuid) -> Result<AttemptCounts>;

    /// Every question of the document with its due time.
    ///
    /// The default walks concepts and questions one at a time; stores that can
    /// join should override it.
    fn review_candidates(&self, document_id: Uuid) -> Result<Vec<ReviewCandidate>> {
        let mut candidates = Vec::new();
        for concept_id in self.concept_ids_for_document(document_id)? {
            for question_id in self.question_ids_for_concept(concept_id)? {
                let Some(question) = self.question(question_id)? else {
                    continue;
                };
                let next_review = self
                    .review_state(question_id)?
                    .and_then(|state| state.next_review);
                candidates.push(ReviewCandidate {
                    question,
                    next_review,
                });
            }
        }
        Ok(candidates)
    }
}
