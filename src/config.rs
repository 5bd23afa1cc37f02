//! Runtime configuration.
//!
//! Scheduler tunables live in [`SchedulerConfig`]; process-level settings are
//! read from environment variables by [`AppConfig::from_env`]:
//! - `STUDY_COMPANION_DB` - Database file path (default: platform data directory)
//! - `STUDY_COMPANION_CORS_ORIGINS` - Allowed CORS origins, comma-separated (permissive if unset)
//! - `STUDY_COMPANION_LAPSE_THRESHOLD` - Quality below which a review resets spacing (default: 3)
//! - `STUDY_COMPANION_SEED` - Seed for the tie-break random source (default: entropy)

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::progress::QUESTIONS_PER_CONCEPT;
use crate::scheduler::LITERAL_LAPSE_THRESHOLD;

/// Tunables for the scheduling and progress computations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulerConfig {
    /// Reviews with a quality below this value reset interval and repetitions.
    ///
    /// The default of 3 is written against a five-level scale, so every outcome
    /// on the 0-2 quality scale lapses. Set it to
    /// [`RENORMALIZED_LAPSE_THRESHOLD`](crate::scheduler::RENORMALIZED_LAPSE_THRESHOLD)
    /// to let successful reviews grow the interval.
    pub lapse_threshold: u8,
    /// Nominal number of questions per concept used for completion percentage.
    pub questions_per_concept: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lapse_threshold: LITERAL_LAPSE_THRESHOLD,
            questions_per_concept: QUESTIONS_PER_CONCEPT,
        }
    }
}

/// Process configuration loaded from environment variables.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Explicit database path. `None` uses the platform data directory.
    pub database_path: Option<PathBuf>,
    /// Allowed CORS origins. `None` allows any origin.
    pub cors_origins: Option<Vec<String>>,
    /// Fixed seed for tie-breaking among equally due questions.
    pub rng_seed: Option<u64>,
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, so tests don't have to touch the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let database_path = lookup("STUDY_COMPANION_DB")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let cors_origins = lookup("STUDY_COMPANION_CORS_ORIGINS").map(|s| {
            s.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let rng_seed = lookup("STUDY_COMPANION_SEED").and_then(|s| s.trim().parse::<u64>().ok());

        let mut scheduler = SchedulerConfig::default();
        if let Some(threshold) = lookup("STUDY_COMPANION_LAPSE_THRESHOLD") {
            match threshold.trim().parse::<u8>() {
                Ok(value) => scheduler.lapse_threshold = value,
                Err(_) => tracing::warn!(
                    "Ignoring invalid STUDY_COMPANION_LAPSE_THRESHOLD: {}",
                    threshold
                ),
            }
        }

        Self {
            database_path,
            cors_origins,
            rng_seed,
            scheduler,
        }
    }
}
