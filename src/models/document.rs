use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::concept::Concept;

/// A processed set of lecture notes.
///
/// Documents are the top-level scope for studying: the next question and the
/// progress summary are both computed per document. The text has already been
/// extracted from the source file by the time a document is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    /// Name of the source file the text came from.
    pub filename: String,
    /// Extracted plain text.
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Input for storing a new document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDocumentInput {
    pub filename: String,
    pub content: String,
}

/// A document with its concepts, used for detailed responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentWithConcepts {
    #[serde(flatten)]
    pub document: Document,
    pub concepts: Vec<Concept>,
}
