use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A key idea extracted from a document.
///
/// Review history is aggregated per concept, and each concept is expected to
/// carry [`QUESTIONS_PER_CONCEPT`](crate::progress::QUESTIONS_PER_CONCEPT)
/// questions when computing completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    pub id: Uuid,
    pub document_id: Uuid,
    pub title: String,
    /// Short explanation shown alongside the concept's questions.
    pub explanation: String,
    pub created_at: DateTime<Utc>,
}

/// Input for adding a concept to a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConceptInput {
    pub title: String,
    pub explanation: String,
}
