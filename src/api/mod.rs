mod handlers;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::db::Database;
use crate::progress::ProgressAggregator;
use crate::scheduler::Scheduler;

/// Shared handler state. Every component wraps the same database handle.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub scheduler: Scheduler<Database>,
    pub progress: ProgressAggregator<Database>,
}

impl AppState {
    pub fn new(db: Database, config: &AppConfig) -> Self {
        let scheduler = match config.rng_seed {
            Some(seed) => Scheduler::with_seed(db.clone(), seed),
            None => Scheduler::new(db.clone()),
        }
        .with_config(config.scheduler.clone());
        let progress = ProgressAggregator::with_config(db.clone(), &config.scheduler);

        Self {
            db,
            scheduler,
            progress,
        }
    }
}

pub fn create_router(db: Database, config: &AppConfig) -> Router {
    let api = Router::new()
        // Documents
        .route("/documents", get(handlers::list_documents))
        .route("/documents", post(handlers::create_document))
        .route("/documents/{id}", get(handlers::get_document))
        .route("/documents/{id}/concepts", get(handlers::list_concepts))
        .route("/documents/{id}/concepts", post(handlers::create_concept))
        .route("/documents/{id}/next-question", get(handlers::next_question))
        .route("/documents/{id}/due", get(handlers::due_questions))
        .route("/documents/{id}/progress", get(handlers::get_progress))
        // Concepts
        .route("/concepts/{id}/questions", get(handlers::list_questions))
        .route("/concepts/{id}/questions", post(handlers::create_question))
        // Reviews
        .route("/questions/{id}/review-state", get(handlers::get_review_state))
        .route("/questions/{id}/reviews", post(handlers::record_review))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config.cors_origins.as_deref()))
        .with_state(AppState::new(db, config))
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let Some(origins) = origins else {
        return CorsLayer::permissive();
    };

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
