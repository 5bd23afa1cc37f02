use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A prompt/reference-answer pair belonging to one concept.
///
/// Questions are immutable once created. Every question owns exactly one
/// [`ReviewState`](super::ReviewState), created alongside it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: Uuid,
    pub concept_id: Uuid,
    pub prompt: String,
    /// Reference answer the grader compares against.
    pub answer: String,
    pub difficulty: Difficulty,
    pub created_at: DateTime<Utc>,
}

/// Nominal difficulty assigned when the question was generated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }
}

/// Input for adding a question to a concept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQuestionInput {
    pub prompt: String,
    pub answer: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}

/// A question as presented to the user: the prompt without its reference answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudyPrompt {
    pub id: Uuid,
    pub prompt: String,
    pub difficulty: Difficulty,
    pub concept_id: Uuid,
    pub concept_title: String,
}

impl StudyPrompt {
    pub fn new(question: Question, concept_title: impl Into<String>) -> Self {
        Self {
            id: question.id,
            prompt: question.prompt,
            difficulty: question.difficulty,
            concept_id: question.concept_id,
            concept_title: concept_title.into(),
        }
    }
}

/// Response for the next-question lookup. `question` is `None` when the document has no questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextQuestionResponse {
    pub question: Option<StudyPrompt>,
}
