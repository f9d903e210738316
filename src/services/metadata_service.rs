//! MetadataService: CRUD over the `videos` table in SQLite.

use crate::models::video::Video;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Schema applied by `--migrate` and by test pools.
pub const MIGRATION_SQL: &str = include_str!("../../migrations/0001_init.sql");

const VIDEO_COLUMNS: &str =
    "id, created_at, updated_at, title, description, thumbnail_url, video_url, user_id";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("video `{0}` not found")]
    VideoNotFound(Uuid),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type MetadataResult<T> = Result<T, MetadataError>;

#[derive(Clone)]
pub struct MetadataService {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl MetadataService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Apply the embedded schema, one statement at a time.
    pub async fn migrate(&self) -> MetadataResult<usize> {
        let statements = MIGRATION_SQL
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        for stmt in &statements {
            tracing::debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }

        Ok(statements.len())
    }

    /// Insert a record with empty video and thumbnail references.
    pub async fn create_video(
        &self,
        user_id: Uuid,
        title: &str,
        description: Option<&str>,
    ) -> MetadataResult<Video> {
        let now = Utc::now();
        let video = sqlx::query_as::<_, Video>(&format!(
            "INSERT INTO videos (id, created_at, updated_at, title, description, user_id)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(now)
        .bind(title)
        .bind(description)
        .bind(user_id)
        .fetch_one(&*self.db)
        .await?;

        Ok(video)
    }

    /// Fetch a record by id. Returns VideoNotFound if missing.
    pub async fn get_video(&self, id: Uuid) -> MetadataResult<Video> {
        sqlx::query_as::<_, Video>(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?"))
            .bind(id)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| match err {
                sqlx::Error::RowNotFound => MetadataError::VideoNotFound(id),
                other => MetadataError::Sqlx(other),
            })
    }

    /// All records owned by `user_id`, newest first.
    pub async fn list_videos(&self, user_id: Uuid) -> MetadataResult<Vec<Video>> {
        let videos = sqlx::query_as::<_, Video>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE user_id = ? ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&*self.db)
        .await?;

        Ok(videos)
    }

    /// Persist the mutable columns of `video` and return the stored row.
    ///
    /// Returns VideoNotFound if the row disappeared in the meantime.
    pub async fn update_video(&self, video: &Video) -> MetadataResult<Video> {
        let result = sqlx::query_as::<_, Video>(&format!(
            "UPDATE videos
             SET title = ?, description = ?, thumbnail_url = ?, video_url = ?, updated_at = ?
             WHERE id = ?
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.thumbnail_url)
        .bind(&video.video_url)
        .bind(Utc::now())
        .bind(video.id)
        .fetch_optional(&*self.db)
        .await?;

        result.ok_or(MetadataError::VideoNotFound(video.id))
    }

    /// Remove a record. Backing objects are left where they are.
    pub async fn delete_video(&self, id: Uuid) -> MetadataResult<()> {
        let result = sqlx::query("DELETE FROM videos WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::VideoNotFound(id));
        }
        Ok(())
    }

    /// Delete every record. Only reachable on dev platforms.
    pub async fn reset(&self) -> MetadataResult<u64> {
        let result = sqlx::query("DELETE FROM videos")
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected())
    }
}
