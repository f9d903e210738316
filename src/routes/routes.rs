//! Defines the HTTP surface of the video service.
//!
//! ## Structure
//! - **Health**
//!   - `GET    /healthz`, `GET /readyz`
//!
//! - **Video records** (bearer token required)
//!   - `POST   /api/videos`: create a record
//!   - `GET    /api/videos`: list the caller's records
//!   - `GET    /api/videos/{video_id}`: fetch one record
//!   - `DELETE /api/videos/{video_id}`: delete one record
//!
//! - **Uploads** (bearer token required, owner only)
//!   - `POST   /api/video_upload/{video_id}`: mp4 in form field `video`
//!   - `POST   /api/thumbnail_upload/{video_id}`: jpeg/png in form field `thumbnail`
//!
//! - **Assets**
//!   - `GET    /assets/{file}`: locally stored thumbnails
//!
//! - **Admin**
//!   - `POST   /admin/reset`: clear all records (dev platform only)
//!
//! Stored and returned video URLs differ: records hold `<bucket>,<key>` and
//! every response carries a freshly presigned URL instead.

use crate::{
    handlers::{
        admin_handlers::reset,
        asset_handlers::get_asset,
        health_handlers::{healthz, readyz},
        video_handlers::{
            create_video, delete_video, get_video, list_videos, upload_thumbnail, upload_video,
        },
    },
    services::{ingest_service::MAX_VIDEO_BYTES, thumbnail_service::MAX_THUMBNAIL_BYTES},
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build the router. Upload routes carry their own body limits.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Record routes
        .route("/api/videos", post(create_video).get(list_videos))
        .route("/api/videos/{video_id}", get(get_video).delete(delete_video))
        // Upload routes
        .route(
            "/api/video_upload/{video_id}",
            post(upload_video).layer(DefaultBodyLimit::max(MAX_VIDEO_BYTES as usize)),
        )
        .route(
            "/api/thumbnail_upload/{video_id}",
            post(upload_thumbnail).layer(DefaultBodyLimit::max(MAX_THUMBNAIL_BYTES as usize)),
        )
        .route("/assets/{file}", get(get_asset))
        .route("/admin/reset", post(reset))
}
