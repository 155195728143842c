// src/models/course.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use url::Url;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum LessonType {
    Video,
    Article,
    Quiz,
}

/// Upload state of a video lesson's media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MediaStatus {
    Processing,
    Uploaded,
    Failed,
}

/// Represents the 'courses' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i64,
    pub tutor_id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: String,
    /// Price per currency code, e.g. {"USD": 19.99}.
    pub price: Json<HashMap<String, f64>>,
    /// Sum of module durations, in seconds.
    pub total_duration: i64,
    pub is_published: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'modules' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    /// 1-based, dense within the course.
    pub position: i64,
    /// Sum of lesson durations, in seconds.
    pub total_duration: i64,
}

/// Represents the 'lessons' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: i64,
    pub course_id: i64,
    pub module_id: i64,
    pub title: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub lesson_type: LessonType,
    /// 1-based, dense within the module.
    pub position: i64,
    pub duration: i64,
    /// Sanitized article body.
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub media_status: Option<MediaStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleTree {
    #[serde(flatten)]
    pub module: Module,
    pub lessons: Vec<Lesson>,
}

/// A course with its modules and lessons in position order.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseTree {
    #[serde(flatten)]
    pub course: Course,
    pub modules: Vec<ModuleTree>,
}

/// DTO for the course authoring transaction.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_course_shape"))]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[validate(length(min = 1, max = 50))]
    pub difficulty: String,
    #[serde(default)]
    #[validate(custom(function = validate_price))]
    pub price: HashMap<String, f64>,
    #[validate(nested)]
    pub modules: Vec<ModuleInput>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ModuleInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(nested)]
    pub lessons: Vec<LessonInput>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_lesson_content"))]
pub struct LessonInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(rename = "type")]
    pub lesson_type: LessonType,
    /// Seconds.
    #[serde(default)]
    #[validate(range(min = 0, max = 86400))]
    pub duration: i64,
    /// Article body (HTML), required for article lessons.
    #[validate(length(max = 100000))]
    pub content: Option<String>,
    /// Media location, required for video lessons.
    pub media_url: Option<String>,
}

impl ModuleInput {
    /// Sum of the module's lesson durations, in seconds.
    pub fn total_duration(&self) -> i64 {
        self.lessons.iter().map(|l| l.duration).sum()
    }
}

fn validate_course_shape(req: &CreateCourseRequest) -> Result<(), validator::ValidationError> {
    if req.modules.len() > 100 {
        return Err(validator::ValidationError::new("too_many_modules"));
    }
    if req.modules.iter().any(|m| m.lessons.len() > 200) {
        return Err(validator::ValidationError::new("too_many_lessons"));
    }
    Ok(())
}

fn validate_price(price: &HashMap<String, f64>) -> Result<(), validator::ValidationError> {
    for (currency, amount) in price {
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(validator::ValidationError::new("invalid_currency_code"));
        }
        if !amount.is_finite() || *amount < 0.0 {
            return Err(validator::ValidationError::new("invalid_price"));
        }
    }
    Ok(())
}

fn validate_lesson_content(lesson: &LessonInput) -> Result<(), validator::ValidationError> {
    match lesson.lesson_type {
        LessonType::Video => match &lesson.media_url {
            Some(url) if Url::parse(url).is_ok() => Ok(()),
            _ => Err(validator::ValidationError::new("video_requires_valid_media_url")),
        },
        LessonType::Article => match &lesson.content {
            Some(body) if !body.trim().is_empty() => Ok(()),
            _ => Err(validator::ValidationError::new("article_requires_content")),
        },
        LessonType::Quiz => Ok(()),
    }
}
