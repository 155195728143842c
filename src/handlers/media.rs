// src/handlers/media.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    error::AppError,
    response::ApiResponse,
    services::media_events::{MediaUploadEvent, MediaUploadResult},
    state::AppState,
    utils::jwt::Claims,
};

#[derive(Debug, Deserialize)]
pub struct MediaEventRequest {
    pub result: MediaUploadResult,
}

/// Ingress for upload-completion notifications on a lesson the tutor owns.
///
/// The event is queued for the media worker and acknowledged with 202; the
/// status transition itself happens asynchronously.
pub async fn report_media_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i64>,
    Json(payload): Json<MediaEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tutor_id = claims.user_id()?;

    let owner: Option<i64> = sqlx::query_scalar(
        "SELECT c.tutor_id FROM lessons l JOIN courses c ON c.id = l.course_id WHERE l.id = ?",
    )
    .bind(lesson_id)
    .fetch_optional(&state.pool)
    .await?;

    match owner {
        None => return Err(AppError::NotFound("Lesson not found".to_string())),
        Some(owner) if owner != tutor_id => {
            return Err(AppError::Forbidden("You do not own this lesson".to_string()));
        }
        Some(_) => {}
    }

    let event = MediaUploadEvent {
        lesson_id,
        result: payload.result,
    };

    state
        .media_events
        .send(event)
        .map_err(|e| AppError::InternalServerError(format!("Media worker is gone: {}", e)))?;

    Ok(ApiResponse::with_status(StatusCode::ACCEPTED, event))
}
