use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use super::AppState;
use crate::error::Error;
use crate::models::*;

type ApiResult<T> = Result<T, (StatusCode, String)>;

// ============================================================
// Error Handling
// ============================================================

/// Map a core error to a response.
///
/// Client errors are returned as-is. Storage failures are logged server-side
/// and clients only see a generic message to avoid leaking internal details.
fn error_response(e: Error) -> (StatusCode, String) {
    match e {
        Error::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
        Error::InvalidArgument(_) => {
            tracing::warn!("Validation error: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        Error::Grading(_) => {
            tracing::warn!("Grader error: {}", e);
            (StatusCode::BAD_GATEWAY, e.to_string())
        }
        Error::Storage(_) => {
            tracing::error!("Internal error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

fn not_found(what: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("{} not found", what))
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Documents
// ============================================================

pub async fn list_documents(State(state): State<AppState>) -> ApiResult<Json<Vec<Document>>> {
    state.db.get_all_documents().map(Json).map_err(error_response)
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DocumentWithConcepts>> {
    state
        .db
        .get_document_with_concepts(id)
        .map_err(error_response)?
        .map(Json)
        .ok_or_else(|| not_found("Document"))
}

pub async fn create_document(
    State(state): State<AppState>,
    Json(input): Json<CreateDocumentInput>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    if input.filename.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Filename required".to_string()));
    }

    state
        .db
        .create_document(input)
        .map(|d| (StatusCode::CREATED, Json(d)))
        .map_err(error_response)
}

// ============================================================
// Concepts
// ============================================================

pub async fn list_concepts(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Concept>>> {
    state
        .db
        .get_document(document_id)
        .map_err(error_response)?
        .ok_or_else(|| not_found("Document"))?;

    state
        .db
        .get_concepts_by_document(document_id)
        .map(Json)
        .map_err(error_response)
}

pub async fn create_concept(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Json(input): Json<CreateConceptInput>,
) -> ApiResult<(StatusCode, Json<Concept>)> {
    state
        .db
        .create_concept(document_id, input)
        .map(|c| (StatusCode::CREATED, Json(c)))
        .map_err(error_response)
}

// ============================================================
// Questions
// ============================================================

pub async fn list_questions(
    State(state): State<AppState>,
    Path(concept_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Question>>> {
    state
        .db
        .get_concept(concept_id)
        .map_err(error_response)?
        .ok_or_else(|| not_found("Concept"))?;

    state
        .db
        .get_questions_by_concept(concept_id)
        .map(Json)
        .map_err(error_response)
}

pub async fn create_question(
    State(state): State<AppState>,
    Path(concept_id): Path<Uuid>,
    Json(input): Json<CreateQuestionInput>,
) -> ApiResult<(StatusCode, Json<Question>)> {
    state
        .db
        .create_question(concept_id, input)
        .map(|q| (StatusCode::CREATED, Json(q)))
        .map_err(error_response)
}

// ============================================================
// Studying
// ============================================================

fn concept_titles(state: &AppState, document_id: Uuid) -> ApiResult<HashMap<Uuid, String>> {
    Ok(state
        .db
        .get_concepts_by_document(document_id)
        .map_err(error_response)?
        .into_iter()
        .map(|c| (c.id, c.title))
        .collect())
}

pub async fn next_question(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> ApiResult<Json<NextQuestionResponse>> {
    let Some(question) = state
        .scheduler
        .pick_next_due(document_id)
        .map_err(error_response)?
    else {
        return Ok(Json(NextQuestionResponse { question: None }));
    };

    let concept_title = state
        .db
        .get_concept(question.concept_id)
        .map_err(error_response)?
        .map(|c| c.title)
        .unwrap_or_default();

    Ok(Json(NextQuestionResponse {
        question: Some(StudyPrompt::new(question, concept_title)),
    }))
}

pub async fn due_questions(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> ApiResult<Json<Vec<StudyPrompt>>> {
    let due = state
        .scheduler
        .due_questions(document_id, Utc::now())
        .map_err(error_response)?;
    let titles = concept_titles(&state, document_id)?;

    Ok(Json(
        due.into_iter()
            .map(|q| {
                let title = titles.get(&q.concept_id).cloned().unwrap_or_default();
                StudyPrompt::new(q, title)
            })
            .collect(),
    ))
}

pub async fn get_progress(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> ApiResult<Json<ProgressReport>> {
    state
        .progress
        .compute_progress(document_id)
        .map(|summary| Json(summary.into()))
        .map_err(error_response)
}

// ============================================================
// Reviews
// ============================================================

pub async fn get_review_state(
    State(state): State<AppState>,
    Path(question_id): Path<Uuid>,
) -> ApiResult<Json<ReviewState>> {
    state
        .scheduler
        .review_state(question_id)
        .map(Json)
        .map_err(error_response)
}

pub async fn record_review(
    State(state): State<AppState>,
    Path(question_id): Path<Uuid>,
    Json(input): Json<ReviewOutcomeInput>,
) -> ApiResult<Json<ReviewOutcome>> {
    state
        .scheduler
        .record_review(question_id, input.correct, input.score)
        .map(Json)
        .map_err(error_response)
}
