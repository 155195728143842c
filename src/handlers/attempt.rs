// src/handlers/attempt.rs

use std::collections::{HashMap, HashSet};

use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rand::{Rng, seq::SliceRandom};
use sqlx::{SqlitePool, types::Json};

use crate::{
    error::{AppError, is_unique_violation},
    handlers::assessment::fetch_assessment,
    models::{
        assessment::Distribution,
        attempt::{
            Attempt, AttemptResultResponse, SnapshotQuestion, StartAttemptResponse,
            StudentQuestion, SubmitAttemptRequest, SubmittedAnswer,
        },
        question::Difficulty,
    },
    response::ApiResponse,
    utils::{jwt::Claims, validated_json::ValidatedJson},
};

const ATTEMPT_COLUMNS: &str = "id, assessment_id, student_id, snapshot, answers, score, \
     max_score, graded, started_at, submitted_at";

/// Eligible question as loaded for sampling.
#[derive(Debug, Clone, sqlx::FromRow)]
struct PoolQuestion {
    id: i64,
    text: String,
    options: Json<Vec<String>>,
    correct_answer: String,
    difficulty: Difficulty,
    points: i64,
}

impl From<&PoolQuestion> for SnapshotQuestion {
    fn from(q: &PoolQuestion) -> Self {
        SnapshotQuestion {
            question_id: q.id,
            text: q.text.clone(),
            options: q.options.0.clone(),
            correct_answer: q.correct_answer.clone(),
            points: q.points,
        }
    }
}

/// Draws at most `total` distinct questions.
///
/// Each tier is sampled uniformly up to its distribution count; slots a tier
/// cannot fill are topped up uniformly from whatever is left in the pool. A
/// pool smaller than `total` yields every question it has.
fn sample_questions<'a, R: Rng + ?Sized>(
    pool: &'a [PoolQuestion],
    distribution: &Distribution,
    total: usize,
    rng: &mut R,
) -> Vec<&'a PoolQuestion> {
    let mut picked: Vec<&PoolQuestion> = Vec::with_capacity(total.min(pool.len()));

    for tier in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
        let want = distribution.count_for(tier).max(0) as usize;
        let tier_pool: Vec<&PoolQuestion> = pool.iter().filter(|q| q.difficulty == tier).collect();
        picked.extend(tier_pool.choose_multiple(&mut *rng, want).copied());
    }
    picked.truncate(total);

    let remaining = total - picked.len();
    if remaining > 0 {
        let taken: HashSet<i64> = picked.iter().map(|q| q.id).collect();
        let leftovers: Vec<&PoolQuestion> = pool.iter().filter(|q| !taken.contains(&q.id)).collect();
        picked.extend(leftovers.choose_multiple(&mut *rng, remaining).copied());
    }

    picked.shuffle(&mut *rng);
    picked
}

/// Sum of points of every snapshot question whose submitted answer equals the
/// stored correct answer exactly. Unanswered questions score nothing.
fn grade(snapshot: &[SnapshotQuestion], answers: &[SubmittedAnswer]) -> i64 {
    // First answer per question wins.
    let mut by_question: HashMap<i64, &str> = HashMap::with_capacity(answers.len());
    for a in answers {
        by_question.entry(a.question_id).or_insert(a.answer.as_str());
    }

    snapshot
        .iter()
        .filter(|q| by_question.get(&q.question_id) == Some(&q.correct_answer.as_str()))
        .map(|q| q.points)
        .sum()
}

/// Rounded integer percentage; 0 when nothing was at stake.
fn percentage(score: i64, max_score: i64) -> i64 {
    if max_score <= 0 {
        return 0;
    }
    ((score as f64 / max_score as f64) * 100.0).round() as i64
}

async fn find_in_progress(
    pool: &SqlitePool,
    assessment_id: i64,
    student_id: i64,
) -> Result<Option<Attempt>, AppError> {
    let attempt = sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {} FROM attempts WHERE assessment_id = ? AND student_id = ? AND submitted_at IS NULL",
        ATTEMPT_COLUMNS
    ))
    .bind(assessment_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    Ok(attempt)
}

fn start_response(attempt: &Attempt, duration_minutes: i64) -> StartAttemptResponse {
    StartAttemptResponse {
        attempt_id: attempt.id,
        questions: attempt.snapshot.iter().map(StudentQuestion::from).collect(),
        started_at: attempt.started_at,
        duration_minutes,
    }
}

/// Starts (or resumes) the student's attempt at a published assessment.
///
/// * An in-progress attempt is returned unchanged (200).
/// * Otherwise questions are sampled, snapshotted and a new attempt is stored (201).
/// * Correct answers never leave the server in this response.
pub async fn start_attempt(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;

    let assessment = fetch_assessment(&pool, assessment_id)
        .await?
        .ok_or(AppError::NotFound("Assessment not found".to_string()))?;

    if !assessment.is_published {
        return Err(AppError::BadRequest("Assessment is not published".to_string()));
    }

    if let Some(existing) = find_in_progress(&pool, assessment_id, student_id).await? {
        tracing::info!("Student {} resumed attempt {}", student_id, existing.id);
        return Ok(ApiResponse::with_status(
            StatusCode::OK,
            start_response(&existing, assessment.duration_minutes),
        ));
    }

    let eligible = sqlx::query_as::<_, PoolQuestion>(
        r#"
        SELECT id, text, options, correct_answer, difficulty, points
        FROM questions
        WHERE assessment_id = ? AND is_deleted = FALSE
        "#,
    )
    .bind(assessment_id)
    .fetch_all(&pool)
    .await?;

    let total = assessment.total_questions.max(0) as usize;
    let snapshot: Vec<SnapshotQuestion> = {
        let mut rng = rand::thread_rng();
        sample_questions(&eligible, &assessment.distribution(), total, &mut rng)
            .into_iter()
            .map(SnapshotQuestion::from)
            .collect()
    };

    if snapshot.is_empty() {
        return Err(AppError::BadRequest(
            "Assessment has no questions available".to_string(),
        ));
    }

    let max_score: i64 = snapshot.iter().map(|q| q.points).sum();
    let started_at = chrono::Utc::now();

    let inserted = sqlx::query(
        r#"
        INSERT INTO attempts
            (assessment_id, student_id, snapshot, answers, score, max_score, graded, started_at)
        VALUES (?, ?, ?, '[]', 0, ?, FALSE, ?)
        "#,
    )
    .bind(assessment_id)
    .bind(student_id)
    .bind(Json(&snapshot))
    .bind(max_score)
    .bind(started_at)
    .execute(&pool)
    .await;

    match inserted {
        Ok(result) => {
            let attempt_id = result.last_insert_rowid();
            tracing::info!(
                "Student {} started attempt {} on assessment {} ({} questions, max {})",
                student_id,
                attempt_id,
                assessment_id,
                snapshot.len(),
                max_score
            );

            Ok(ApiResponse::with_status(
                StatusCode::CREATED,
                StartAttemptResponse {
                    attempt_id,
                    questions: snapshot.iter().map(StudentQuestion::from).collect(),
                    started_at,
                    duration_minutes: assessment.duration_minutes,
                },
            ))
        }
        // A concurrent start won the partial unique index; hand back its attempt.
        Err(e) if is_unique_violation(&e) => {
            let existing = find_in_progress(&pool, assessment_id, student_id)
                .await?
                .ok_or(AppError::Conflict("Attempt start raced, please retry".to_string()))?;
            Ok(ApiResponse::with_status(
                StatusCode::OK,
                start_response(&existing, assessment.duration_minutes),
            ))
        }
        Err(e) => {
            tracing::error!("Failed to start attempt: {:?}", e);
            Err(AppError::InternalServerError(e.to_string()))
        }
    }
}

/// Grades and closes the student's in-progress attempt.
///
/// Scoring reads only the snapshot. Answers, score, graded flag and submission time
/// are written in one UPDATE guarded by `submitted_at IS NULL`, so a second submit
/// (sequential or concurrent) finds no active attempt.
pub async fn submit_attempt(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;

    let attempt = find_in_progress(&pool, assessment_id, student_id)
        .await?
        .ok_or(AppError::NotFound("Active attempt not found".to_string()))?;

    let score = grade(&attempt.snapshot, &payload.answers);
    let submitted_at = chrono::Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE attempts
        SET answers = ?, score = ?, graded = TRUE, submitted_at = ?
        WHERE id = ? AND submitted_at IS NULL
        "#,
    )
    .bind(Json(&payload.answers))
    .bind(score)
    .bind(submitted_at)
    .bind(attempt.id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Active attempt not found".to_string()));
    }

    tracing::info!(
        "Attempt {} graded: {}/{}",
        attempt.id,
        score,
        attempt.max_score
    );

    Ok(ApiResponse::ok(AttemptResultResponse {
        attempt_id: attempt.id,
        score,
        max_score: attempt.max_score,
        percentage: percentage(score, attempt.max_score),
        submitted_at,
    }))
}

/// Reads the persisted grading of one of the student's submitted attempts.
pub async fn get_result(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;

    let attempt = sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {} FROM attempts WHERE id = ? AND student_id = ? AND submitted_at IS NOT NULL",
        ATTEMPT_COLUMNS
    ))
    .bind(attempt_id)
    .bind(student_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Result not found".to_string()))?;

    let submitted_at = attempt
        .submitted_at
        .ok_or(AppError::NotFound("Result not found".to_string()))?;

    Ok(ApiResponse::ok(AttemptResultResponse {
        attempt_id: attempt.id,
        score: attempt.score,
        max_score: attempt.max_score,
        percentage: percentage(attempt.score, attempt.max_score),
        submitted_at,
    }))
}
