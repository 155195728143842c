// src/handlers/question.rs

use axum::{
    Extension,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::{QueryBuilder, Sqlite, SqlitePool, types::Json};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::assessment::fetch_owned_assessment,
    models::question::{DeleteQuestionsRequest, GenerateQuestionsRequest, Question, QuestionInput},
    response::ApiResponse,
    services::question_generator::generate_with_retry,
    state::AppState,
    utils::{jwt::Claims, validated_json::ValidatedJson},
};

const QUESTION_COLUMNS: &str =
    "id, assessment_id, text, options, correct_answer, difficulty, points, is_deleted, created_at";

async fn fetch_question(pool: &SqlitePool, id: i64) -> Result<Option<Question>, AppError> {
    let question = sqlx::query_as::<_, Question>(&format!(
        "SELECT {} FROM questions WHERE id = ?",
        QUESTION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(question)
}

/// Adds a question to an assessment's bank.
pub async fn create_question(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<QuestionInput>,
) -> Result<impl IntoResponse, AppError> {
    let tutor_id = claims.user_id()?;
    fetch_owned_assessment(&pool, assessment_id, tutor_id).await?;

    let id = sqlx::query(
        r#"
        INSERT INTO questions
            (assessment_id, text, options, correct_answer, difficulty, points, is_deleted, created_at)
        VALUES (?, ?, ?, ?, ?, ?, FALSE, ?)
        "#,
    )
    .bind(assessment_id)
    .bind(&payload.text)
    .bind(Json(&payload.options))
    .bind(&payload.correct_answer)
    .bind(payload.difficulty)
    .bind(payload.points)
    .bind(chrono::Utc::now())
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?
    .last_insert_rowid();

    let question = fetch_question(&pool, id)
        .await?
        .ok_or(AppError::InternalServerError("Question vanished after insert".to_string()))?;

    Ok(ApiResponse::created(question))
}

/// Generates a batch of questions through the external generator and stores them.
///
/// Every generated question goes through the same validation as a manual create;
/// one bad item rejects the batch. The batch is inserted in a single transaction.
pub async fn generate_questions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<GenerateQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tutor_id = claims.user_id()?;
    fetch_owned_assessment(&state.pool, assessment_id, tutor_id).await?;

    let generated = generate_with_retry(state.generator.as_ref(), &payload, &state.config).await?;

    // Extra items beyond what was asked for are dropped.
    let inputs: Vec<QuestionInput> = generated
        .into_iter()
        .take(payload.count as usize)
        .map(QuestionInput::from)
        .collect();
    if inputs.is_empty() {
        return Err(AppError::ServiceUnavailable(
            "Question generator returned no questions".to_string(),
        ));
    }
    for (i, input) in inputs.iter().enumerate() {
        input.validate().map_err(|e| {
            AppError::ServiceUnavailable(format!(
                "Question generator returned an invalid question #{}: {}",
                i + 1,
                e
            ))
        })?;
    }

    let now = chrono::Utc::now();
    let mut tx = state.pool.begin().await?;
    let mut ids = Vec::with_capacity(inputs.len());

    for input in &inputs {
        let id = sqlx::query(
            r#"
            INSERT INTO questions
                (assessment_id, text, options, correct_answer, difficulty, points, is_deleted, created_at)
            VALUES (?, ?, ?, ?, ?, ?, FALSE, ?)
            "#,
        )
        .bind(assessment_id)
        .bind(&input.text)
        .bind(Json(&input.options))
        .bind(&input.correct_answer)
        .bind(input.difficulty)
        .bind(input.points)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
        ids.push(id);
    }

    tx.commit().await?;

    tracing::info!(
        "Stored {} generated questions for assessment {}",
        ids.len(),
        assessment_id
    );

    let mut query_builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM questions WHERE id IN (",
        QUESTION_COLUMNS
    ));
    let mut separated = query_builder.separated(",");
    for id in &ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY id");

    let questions: Vec<Question> = query_builder
        .build_query_as()
        .fetch_all(&state.pool)
        .await?;

    Ok(ApiResponse::created(questions))
}

/// Lists the non-deleted questions of an assessment.
pub async fn list_questions(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let tutor_id = claims.user_id()?;
    fetch_owned_assessment(&pool, assessment_id, tutor_id).await?;

    let questions = sqlx::query_as::<_, Question>(&format!(
        "SELECT {} FROM questions WHERE assessment_id = ? AND is_deleted = FALSE ORDER BY id",
        QUESTION_COLUMNS
    ))
    .bind(assessment_id)
    .fetch_all(&pool)
    .await?;

    Ok(ApiResponse::ok(questions))
}

/// Replaces a live question's content.
/// Attempts already started keep grading against their own snapshot.
pub async fn update_question(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<QuestionInput>,
) -> Result<impl IntoResponse, AppError> {
    let tutor_id = claims.user_id()?;

    let question = fetch_question(&pool, id)
        .await?
        .filter(|q| !q.is_deleted)
        .ok_or(AppError::NotFound("Question not found".to_string()))?;
    fetch_owned_assessment(&pool, question.assessment_id, tutor_id).await?;

    sqlx::query(
        r#"
        UPDATE questions
        SET text = ?, options = ?, correct_answer = ?, difficulty = ?, points = ?
        WHERE id = ? AND is_deleted = FALSE
        "#,
    )
    .bind(&payload.text)
    .bind(Json(&payload.options))
    .bind(&payload.correct_answer)
    .bind(payload.difficulty)
    .bind(payload.points)
    .bind(id)
    .execute(&pool)
    .await?;

    let updated = fetch_question(&pool, id)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    Ok(ApiResponse::ok(updated))
}

/// Bulk soft delete. Only questions in assessments the tutor owns are flagged;
/// returns how many rows changed.
pub async fn delete_questions(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    ValidatedJson(payload): ValidatedJson<DeleteQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tutor_id = claims.user_id()?;

    let mut query_builder = QueryBuilder::<Sqlite>::new(
        "UPDATE questions SET is_deleted = TRUE \
         WHERE is_deleted = FALSE \
         AND assessment_id IN (SELECT id FROM assessments WHERE tutor_id = ",
    );
    query_builder.push_bind(tutor_id);
    query_builder.push(") AND id IN (");

    let mut separated = query_builder.separated(",");
    for id in &payload.ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let result = query_builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to soft delete questions: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(ApiResponse::ok(serde_json::json!({ "deleted": result.rows_affected() })))
}
