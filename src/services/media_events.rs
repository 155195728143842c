// src/services/media_events.rs

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{error::AppError, models::course::MediaStatus};

/// Outcome reported by the upload collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaUploadResult {
    Uploaded,
    Failed,
}

impl From<MediaUploadResult> for MediaStatus {
    fn from(result: MediaUploadResult) -> Self {
        match result {
            MediaUploadResult::Uploaded => MediaStatus::Uploaded,
            MediaUploadResult::Failed => MediaStatus::Failed,
        }
    }
}

/// Upload completion notification for a lesson's media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaUploadEvent {
    pub lesson_id: i64,
    pub result: MediaUploadResult,
}

pub type MediaEventSender = mpsc::UnboundedSender<MediaUploadEvent>;

/// Moves a lesson out of `processing`.
///
/// Only a lesson still in `processing` is touched, so re-delivering an event
/// (or a late conflicting one) is a no-op. Returns whether the status changed.
pub async fn apply_media_event(pool: &SqlitePool, event: &MediaUploadEvent) -> Result<bool, AppError> {
    let next: MediaStatus = event.result.into();

    let result = sqlx::query(
        "UPDATE lessons SET media_status = ? WHERE id = ? AND media_status = 'processing'",
    )
    .bind(next)
    .bind(event.lesson_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Starts the background consumer and returns the sending half.
/// The worker stops once every sender has been dropped.
pub fn spawn_media_worker(pool: SqlitePool) -> (MediaEventSender, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<MediaUploadEvent>();

    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match apply_media_event(&pool, &event).await {
                Ok(true) => tracing::info!(
                    "Lesson {} media marked {:?}",
                    event.lesson_id,
                    event.result
                ),
                Ok(false) => tracing::debug!(
                    "Ignored media event for lesson {} (not processing)",
                    event.lesson_id
                ),
                Err(e) => tracing::error!(
                    "Failed to apply media event for lesson {}: {}",
                    event.lesson_id,
                    e
                ),
            }
        }
    });

    (tx, handle)
}
