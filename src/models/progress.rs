use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw attempt counts across all concepts of a document.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttemptCounts {
    pub total: u64,
    pub correct: u64,
    pub incorrect: u64,
}

/// Study statistics for one document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressSummary {
    pub document_id: Uuid,
    pub total_concepts: u64,
    /// Total graded attempts.
    pub reviewed: u64,
    pub correct: u64,
    pub incorrect: u64,
    /// Rounded percentage of correct attempts, 0 when nothing was reviewed.
    pub accuracy: u32,
    /// Rounded percentage of the nominal question quota that has been attempted.
    /// Can exceed 100 once questions are reviewed more than once.
    pub completion_percentage: u32,
    pub recommendation: RecommendationTier,
}

/// Coarse study recommendation derived from accuracy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationTier {
    NotStarted,
    Strong,
    Developing,
    NeedsWork,
}

impl RecommendationTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Strong => "strong",
            Self::Developing => "developing",
            Self::NeedsWork => "needs_work",
        }
    }

    /// Study advice shown to the user for this tier.
    pub fn advice(&self) -> &'static [&'static str] {
        match self {
            Self::NotStarted => {
                &["You haven't started studying yet. Begin your quiz to track progress!"]
            }
            Self::Strong => &[
                "Excellent work! You're showing strong understanding. \
                 Review marked concepts one more time before your quiz.",
            ],
            Self::Developing => &[
                "Good progress! Focus on the concepts where you had incorrect answers.",
                "Review the explanations and take more practice questions to improve.",
            ],
            Self::NeedsWork => &[
                "Keep practicing! You have time before your quiz. \
                 Review all concepts and retake the questions.",
                "Focus on understanding the why behind each answer, not just memorization.",
            ],
        }
    }
}

/// A progress summary together with the advice for its tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressReport {
    #[serde(flatten)]
    pub summary: ProgressSummary,
    pub advice: Vec<String>,
}

impl From<ProgressSummary> for ProgressReport {
    fn from(summary: ProgressSummary) -> Self {
        let advice = summary
            .recommendation
            .advice()
            .iter()
            .map(|line| line.to_string())
            .collect();
        Self { summary, advice }
    }
}
