//! Represents a video record owned by a user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A video's metadata row.
///
/// `video_url` holds the composite `<bucket>,<key>` reference while the row
/// is at rest. Handlers swap it for a presigned URL before the record leaves
/// the service, so the stored form is never serialized to clients.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Video {
    /// Unique identifier for this video.
    pub id: Uuid,

    /// When this record was created.
    pub created_at: DateTime<Utc>,

    /// When this record was last modified.
    pub updated_at: DateTime<Utc>,

    pub title: String,

    pub description: Option<String>,

    /// Plain URL of a locally served thumbnail asset.
    pub thumbnail_url: Option<String>,

    /// Composite storage reference at rest, presigned URL in responses.
    pub video_url: Option<String>,

    /// ID of the user that owns this video.
    pub user_id: Uuid,
}

impl Video {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

/// Request body for `POST /api/videos`.
#[derive(Deserialize, Debug)]
pub struct CreateVideoParams {
    pub title: String,
    pub description: Option<String>,
}
