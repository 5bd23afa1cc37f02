use thiserror::Error;

/// Errors reported by the scheduling and progress operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The backing store failed. Passed through untouched; callers own any retry policy.
    #[error("Storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Grading failed: {0}")]
    Grading(String),
}

impl Error {
    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{} {}", what, id))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
