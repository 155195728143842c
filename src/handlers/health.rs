use axum::{extract::State, response::IntoResponse};
use sqlx::SqlitePool;

use crate::{error::AppError, response::ApiResponse};

/// Liveness plus a round trip to the database.
pub async fn health(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    sqlx::query("SELECT 1").execute(&pool).await?;
    Ok(ApiResponse::ok(serde_json::json!({ "status": "ok" })))
}
