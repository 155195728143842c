// src/handlers/assessment.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    error::{AppError, is_unique_violation},
    models::{
        assessment::{
            Assessment, AssessmentResponse, CreateAssessmentRequest, PublishRequest, PublishState,
            UpdateAssessmentRequest,
        },
        course::LessonType,
    },
    response::ApiResponse,
    utils::{jwt::Claims, validated_json::ValidatedJson},
};

const ASSESSMENT_COLUMNS: &str = "id, lesson_id, tutor_id, title, total_questions, easy_count, \
     medium_count, hard_count, duration_minutes, is_published, created_at, updated_at";

/// Lesson type and owning tutor, as needed by the assessment ownership checks.
#[derive(sqlx::FromRow)]
struct LessonOwner {
    #[sqlx(rename = "type")]
    lesson_type: LessonType,
    tutor_id: i64,
}

pub(crate) async fn fetch_assessment(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<Assessment>, AppError> {
    let assessment = sqlx::query_as::<_, Assessment>(&format!(
        "SELECT {} FROM assessments WHERE id = ?",
        ASSESSMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(assessment)
}

/// Loads an assessment and checks that `tutor_id` owns it.
pub(crate) async fn fetch_owned_assessment(
    pool: &SqlitePool,
    id: i64,
    tutor_id: i64,
) -> Result<Assessment, AppError> {
    let assessment = fetch_assessment(pool, id)
        .await?
        .ok_or(AppError::NotFound("Assessment not found".to_string()))?;

    if assessment.tutor_id != tutor_id {
        return Err(AppError::Forbidden(
            "You do not own this assessment".to_string(),
        ));
    }
    Ok(assessment)
}

/// Creates a draft assessment for a quiz lesson the tutor owns.
///
/// * Lesson must exist, be quiz-typed and belong to one of the tutor's courses.
/// * One assessment per lesson (UNIQUE on `lesson_id` backs the existence check).
pub async fn create_assessment(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    ValidatedJson(payload): ValidatedJson<CreateAssessmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tutor_id = claims.user_id()?;

    let lesson = sqlx::query_as::<_, LessonOwner>(
        r#"
        SELECT l.type, c.tutor_id
        FROM lessons l
        JOIN courses c ON c.id = l.course_id
        WHERE l.id = ?
        "#,
    )
    .bind(payload.lesson_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Lesson not found".to_string()))?;

    if lesson.tutor_id != tutor_id {
        return Err(AppError::Forbidden("You do not own this lesson".to_string()));
    }
    if lesson.lesson_type != LessonType::Quiz {
        return Err(AppError::BadRequest(
            "Assessments can only be attached to quiz lessons".to_string(),
        ));
    }

    let existing = sqlx::query("SELECT id FROM assessments WHERE lesson_id = ?")
        .bind(payload.lesson_id)
        .fetch_optional(&pool)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(
            "An assessment already exists for this lesson".to_string(),
        ));
    }

    let now = chrono::Utc::now();
    let id = sqlx::query(
        r#"
        INSERT INTO assessments
            (lesson_id, tutor_id, title, total_questions, easy_count, medium_count,
             hard_count, duration_minutes, is_published, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, FALSE, ?, ?)
        "#,
    )
    .bind(payload.lesson_id)
    .bind(tutor_id)
    .bind(&payload.title)
    .bind(payload.total_questions)
    .bind(payload.distribution.easy)
    .bind(payload.distribution.medium)
    .bind(payload.distribution.hard)
    .bind(payload.duration_minutes)
    .bind(now)
    .bind(now)
    .execute(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("An assessment already exists for this lesson".to_string())
        } else {
            tracing::error!("Failed to create assessment: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?
    .last_insert_rowid();

    let assessment = fetch_assessment(&pool, id)
        .await?
        .ok_or(AppError::InternalServerError("Assessment vanished after insert".to_string()))?;

    tracing::info!("Tutor {} created assessment {} on lesson {}", tutor_id, id, payload.lesson_id);

    Ok(ApiResponse::created(AssessmentResponse::from(assessment)))
}

/// Fetches the assessment configured on a lesson.
/// Drafts are only visible to their owner.
pub async fn get_assessment_by_lesson(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let assessment = sqlx::query_as::<_, Assessment>(&format!(
        "SELECT {} FROM assessments WHERE lesson_id = ?",
        ASSESSMENT_COLUMNS
    ))
    .bind(lesson_id)
    .fetch_optional(&pool)
    .await?
    .filter(|a| a.is_published || a.tutor_id == user_id)
    .ok_or(AppError::NotFound("Assessment not found".to_string()))?;

    Ok(ApiResponse::ok(AssessmentResponse::from(assessment)))
}

/// Updates a draft assessment.
///
/// Computes the full next state from stored values plus the patch, checks the
/// distribution invariant on it, and writes it in one conditional UPDATE that
/// only matches while the assessment is still a draft.
pub async fn update_assessment(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<UpdateAssessmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tutor_id = claims.user_id()?;
    let current = fetch_owned_assessment(&pool, id, tutor_id).await?;

    if current.is_published {
        return Err(AppError::Conflict(
            "Unpublish the assessment before editing it".to_string(),
        ));
    }

    let total_questions = payload.total_questions.unwrap_or(current.total_questions);
    let distribution = payload.distribution.unwrap_or_else(|| current.distribution());
    let duration_minutes = payload.duration_minutes.unwrap_or(current.duration_minutes);
    let title = payload.title.unwrap_or(current.title);

    distribution.ensure_matches(total_questions)?;

    let result = sqlx::query(
        r#"
        UPDATE assessments
        SET title = ?, total_questions = ?, easy_count = ?, medium_count = ?,
            hard_count = ?, duration_minutes = ?, updated_at = ?
        WHERE id = ? AND is_published = FALSE
        "#,
    )
    .bind(&title)
    .bind(total_questions)
    .bind(distribution.easy)
    .bind(distribution.medium)
    .bind(distribution.hard)
    .bind(duration_minutes)
    .bind(chrono::Utc::now())
    .bind(id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "Unpublish the assessment before editing it".to_string(),
        ));
    }

    let updated = fetch_assessment(&pool, id)
        .await?
        .ok_or(AppError::NotFound("Assessment not found".to_string()))?;

    Ok(ApiResponse::ok(AssessmentResponse::from(updated)))
}

/// Publishes or unpublishes an assessment (`{ "publish": bool }`).
pub async fn set_publish_state(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<PublishRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tutor_id = claims.user_id()?;
    let current = fetch_owned_assessment(&pool, id, tutor_id).await?;

    let next = current
        .state()
        .transition(payload.publish, current.total_questions)?;
    let publish = next == PublishState::Published;

    // Compare-and-swap on the flag so two concurrent toggles cannot both win.
    let result = sqlx::query(
        "UPDATE assessments SET is_published = ?, updated_at = ? WHERE id = ? AND is_published = ?",
    )
    .bind(publish)
    .bind(chrono::Utc::now())
    .bind(id)
    .bind(current.is_published)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "Assessment state changed concurrently".to_string(),
        ));
    }

    tracing::info!("Assessment {} is now {:?}", id, next);

    let updated = fetch_assessment(&pool, id)
        .await?
        .ok_or(AppError::NotFound("Assessment not found".to_string()))?;

    Ok(ApiResponse::ok(AssessmentResponse::from(updated)))
}
