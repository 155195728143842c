// src/models/assessment.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::{error::AppError, models::question::Difficulty};

/// Required number of questions per difficulty tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Distribution {
    #[validate(range(min = 0, max = 200))]
    pub easy: i64,
    #[validate(range(min = 0, max = 200))]
    pub medium: i64,
    #[validate(range(min = 0, max = 200))]
    pub hard: i64,
}

impl Distribution {
    pub fn total(&self) -> i64 {
        self.easy + self.medium + self.hard
    }

    pub fn count_for(&self, difficulty: Difficulty) -> i64 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }

    /// The tier counts must add up to the assessment's question count.
    pub fn ensure_matches(&self, total_questions: i64) -> Result<(), AppError> {
        if self.total() != total_questions {
            return Err(AppError::BadRequest(format!(
                "Difficulty distribution sums to {} but totalQuestions is {}",
                self.total(),
                total_questions
            )));
        }
        Ok(())
    }
}

/// Represents the 'assessments' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Assessment {
    pub id: i64,
    pub lesson_id: i64,
    pub tutor_id: i64,
    pub title: String,
    pub total_questions: i64,
    pub easy_count: i64,
    pub medium_count: i64,
    pub hard_count: i64,
    pub duration_minutes: i64,
    pub is_published: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Publish state of an assessment. Both states are revisitable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishState {
    Draft,
    Published,
}

impl PublishState {
    /// Guard for `setPublishState`.
    ///
    /// Publishing requires a draft with at least one question; unpublishing
    /// requires a published assessment.
    pub fn transition(self, publish: bool, total_questions: i64) -> Result<PublishState, AppError> {
        match (self, publish) {
            (PublishState::Published, true) => Err(AppError::Conflict(
                "Assessment is already published".to_string(),
            )),
            (PublishState::Draft, false) => Err(AppError::Conflict(
                "Assessment is not published".to_string(),
            )),
            (PublishState::Draft, true) if total_questions <= 0 => Err(AppError::BadRequest(
                "Cannot publish an assessment without questions".to_string(),
            )),
            (PublishState::Draft, true) => Ok(PublishState::Published),
            (PublishState::Published, false) => Ok(PublishState::Draft),
        }
    }
}

impl Assessment {
    pub fn distribution(&self) -> Distribution {
        Distribution {
            easy: self.easy_count,
            medium: self.medium_count,
            hard: self.hard_count,
        }
    }

    pub fn state(&self) -> PublishState {
        if self.is_published {
            PublishState::Published
        } else {
            PublishState::Draft
        }
    }
}

/// DTO returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResponse {
    pub id: i64,
    pub lesson_id: i64,
    pub tutor_id: i64,
    pub title: String,
    pub total_questions: i64,
    pub distribution: Distribution,
    pub duration_minutes: i64,
    pub is_published: bool,
    pub state: PublishState,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Assessment> for AssessmentResponse {
    fn from(a: Assessment) -> Self {
        Self {
            distribution: a.distribution(),
            state: a.state(),
            id: a.id,
            lesson_id: a.lesson_id,
            tutor_id: a.tutor_id,
            title: a.title,
            total_questions: a.total_questions,
            duration_minutes: a.duration_minutes,
            is_published: a.is_published,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

/// DTO for creating an assessment on a quiz lesson.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_create_distribution"))]
pub struct CreateAssessmentRequest {
    pub lesson_id: i64,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(range(min = 0, max = 200))]
    pub total_questions: i64,
    #[validate(nested)]
    pub distribution: Distribution,
    #[validate(range(min = 1, max = 600))]
    pub duration_minutes: i64,
}

fn validate_create_distribution(
    req: &CreateAssessmentRequest,
) -> Result<(), validator::ValidationError> {
    if req.distribution.total() != req.total_questions {
        return Err(validator::ValidationError::new(
            "distribution_must_sum_to_total_questions",
        ));
    }
    Ok(())
}

/// DTO for updating a draft assessment. Missing fields keep their stored value;
/// the merged result is re-checked against the distribution invariant.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssessmentRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(range(min = 0, max = 200))]
    pub total_questions: Option<i64>,
    #[validate(nested)]
    pub distribution: Option<Distribution>,
    #[validate(range(min = 1, max = 600))]
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub publish: bool,
}
