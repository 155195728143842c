// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

/// Frozen copy of a sampled question, captured when the attempt starts.
/// Grading only ever reads this, never the live question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotQuestion {
    pub question_id: i64,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub points: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: i64,
    pub answer: String,
}

/// Represents the 'attempts' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Attempt {
    pub id: i64,
    pub assessment_id: i64,
    pub student_id: i64,
    pub snapshot: Json<Vec<SnapshotQuestion>>,
    pub answers: Json<Vec<SubmittedAnswer>>,
    pub score: i64,
    pub max_score: i64,
    pub graded: bool,
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// `None` while the attempt is in progress.
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Student-facing view of a snapshot question (no correct answer, no points).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentQuestion {
    pub question_id: i64,
    pub text: String,
    pub options: Vec<String>,
}

impl From<&SnapshotQuestion> for StudentQuestion {
    fn from(q: &SnapshotQuestion) -> Self {
        Self {
            question_id: q.question_id,
            text: q.text.clone(),
            options: q.options.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAttemptResponse {
    pub attempt_id: i64,
    pub questions: Vec<StudentQuestion>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub duration_minutes: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAttemptRequest {
    #[validate(length(max = 500))]
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResultResponse {
    pub attempt_id: i64,
    pub score: i64,
    pub max_score: i64,
    pub percentage: i64,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}
