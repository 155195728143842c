// src/handlers/course.rs

use axum::{
    Extension,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::{SqlitePool, types::Json};

use crate::{
    error::AppError,
    models::course::{
        Course, CourseTree, CreateCourseRequest, Lesson, LessonType, MediaStatus, Module,
        ModuleTree,
    },
    response::ApiResponse,
    utils::{html::clean_html, jwt::Claims, validated_json::ValidatedJson},
};

const COURSE_COLUMNS: &str = "id, tutor_id, title, description, category, difficulty, price, \
     total_duration, is_published, created_at";
const MODULE_COLUMNS: &str = "id, course_id, title, position, total_duration";
const LESSON_COLUMNS: &str = "id, course_id, module_id, title, type, position, duration, content, \
     media_url, media_status";

/// Creates a course with all of its modules and lessons in one transaction.
///
/// Positions are assigned 1..N in input order. Module and course durations are
/// rolled up from lesson durations and written with the rows themselves. Any failure drops the
/// transaction, so nothing from this call becomes visible.
pub async fn create_course_with_content(
    pool: &SqlitePool,
    dto: &CreateCourseRequest,
    tutor_id: i64,
) -> Result<i64, AppError> {
    let course_duration: i64 = dto.modules.iter().map(|m| m.total_duration()).sum();

    let mut tx = pool.begin().await?;

    let course_id = sqlx::query(
        r#"
        INSERT INTO courses
            (tutor_id, title, description, category, difficulty, price, total_duration,
             is_published, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, FALSE, ?)
        "#,
    )
    .bind(tutor_id)
    .bind(&dto.title)
    .bind(&dto.description)
    .bind(&dto.category)
    .bind(&dto.difficulty)
    .bind(Json(&dto.price))
    .bind(course_duration)
    .bind(chrono::Utc::now())
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    for (module_index, module) in dto.modules.iter().enumerate() {
        let module_id = sqlx::query(
            "INSERT INTO modules (course_id, title, position, total_duration) VALUES (?, ?, ?, ?)",
        )
        .bind(course_id)
        .bind(&module.title)
        .bind(module_index as i64 + 1)
        .bind(module.total_duration())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for (lesson_index, lesson) in module.lessons.iter().enumerate() {
            let (content, media_url, media_status) = match lesson.lesson_type {
                LessonType::Video => (
                    None,
                    lesson.media_url.clone(),
                    Some(MediaStatus::Processing),
                ),
                LessonType::Article => (lesson.content.as_deref().map(clean_html), None, None),
                LessonType::Quiz => (None, None, None),
            };

            sqlx::query(
                r#"
                INSERT INTO lessons
                    (course_id, module_id, title, type, position, duration, content,
                     media_url, media_status)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(course_id)
            .bind(module_id)
            .bind(&lesson.title)
            .bind(lesson.lesson_type)
            .bind(lesson_index as i64 + 1)
            .bind(lesson.duration)
            .bind(content)
            .bind(media_url)
            .bind(media_status)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;

    Ok(course_id)
}

/// Loads a course with its modules and lessons ordered by position.
pub async fn load_course_tree(
    pool: &SqlitePool,
    course_id: i64,
) -> Result<Option<CourseTree>, AppError> {
    let Some(course) = sqlx::query_as::<_, Course>(&format!(
        "SELECT {} FROM courses WHERE id = ?",
        COURSE_COLUMNS
    ))
    .bind(course_id)
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let modules = sqlx::query_as::<_, Module>(&format!(
        "SELECT {} FROM modules WHERE course_id = ? ORDER BY position",
        MODULE_COLUMNS
    ))
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    let mut lessons = sqlx::query_as::<_, Lesson>(&format!(
        "SELECT {} FROM lessons WHERE course_id = ? ORDER BY module_id, position",
        LESSON_COLUMNS
    ))
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    let modules = modules
        .into_iter()
        .map(|module| {
            let (own, rest): (Vec<Lesson>, Vec<Lesson>) = std::mem::take(&mut lessons)
                .into_iter()
                .partition(|l| l.module_id == module.id);
            lessons = rest;
            ModuleTree {
                module,
                lessons: own,
            }
        })
        .collect();

    Ok(Some(CourseTree { course, modules }))
}

/// Enrollment check collaborator.
pub async fn is_enrolled(pool: &SqlitePool, user_id: i64, course_id: i64) -> Result<bool, AppError> {
    let row = sqlx::query("SELECT 1 FROM enrollments WHERE user_id = ? AND course_id = ?")
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

/// Runs the authoring transaction for the calling tutor.
pub async fn create_course(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    ValidatedJson(payload): ValidatedJson<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tutor_id = claims.user_id()?;

    let course_id = create_course_with_content(&pool, &payload, tutor_id)
        .await
        .map_err(|e| {
            tracing::error!("Course authoring rolled back: {}", e);
            e
        })?;

    let tree = load_course_tree(&pool, course_id)
        .await?
        .ok_or(AppError::InternalServerError("Course vanished after commit".to_string()))?;

    tracing::info!(
        "Tutor {} authored course {} ({} modules, {}s)",
        tutor_id,
        course_id,
        tree.modules.len(),
        tree.course.total_duration
    );

    Ok(ApiResponse::created(tree))
}

/// Course content, visible to the owning tutor and enrolled students.
pub async fn get_course(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let tree = load_course_tree(&pool, course_id)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))?;

    if tree.course.tutor_id != user_id && !is_enrolled(&pool, user_id, course_id).await? {
        return Err(AppError::Forbidden(
            "You are not enrolled in this course".to_string(),
        ));
    }

    Ok(ApiResponse::ok(tree))
}
