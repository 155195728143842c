// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// Difficulty tier a question is tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,
    pub assessment_id: i64,

    /// The text content of the question.
    pub text: String,

    /// Answer options in display order, stored as a JSON array.
    pub options: Json<Vec<String>>,

    /// Must be one of `options`.
    pub correct_answer: String,

    pub difficulty: Difficulty,

    pub points: i64,

    /// Soft-delete flag. Questions are never physically removed because
    /// historical attempt snapshots reference them.
    pub is_deleted: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

fn default_points() -> i64 {
    1
}

/// DTO for creating or replacing a question.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_answer_in_options"))]
pub struct QuestionInput {
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    #[validate(length(min = 1, max = 500))]
    pub correct_answer: String,
    pub difficulty: Difficulty,
    #[serde(default = "default_points")]
    #[validate(range(min = 1, max = 100))]
    pub points: i64,
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 {
        return Err(validator::ValidationError::new("at_least_two_options"));
    }
    if options.len() > 10 {
        return Err(validator::ValidationError::new("too_many_options"));
    }
    for opt in options {
        if opt.trim().is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

fn validate_answer_in_options(input: &QuestionInput) -> Result<(), validator::ValidationError> {
    if !input.options.contains(&input.correct_answer) {
        return Err(validator::ValidationError::new(
            "correct_answer_must_be_one_of_options",
        ));
    }
    Ok(())
}

/// DTO for asking the generator service for a batch of questions.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuestionsRequest {
    #[validate(length(min = 1, max = 4000))]
    pub prompt: String,
    #[validate(range(min = 1, max = 50))]
    pub count: u32,
    pub difficulty: Difficulty,
    #[validate(length(min = 1, max = 50))]
    pub question_type: String,
}

/// DTO for bulk soft deletion.
#[derive(Debug, Deserialize, Validate)]
pub struct DeleteQuestionsRequest {
    #[validate(length(min = 1, max = 500))]
    pub ids: Vec<i64>,
}
