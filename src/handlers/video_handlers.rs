//! HTTP handlers for video records and their uploads.
//!
//! Upload handlers check, in order: path id, bearer token, record lookup,
//! ownership, declared body size, multipart framing. Content sniffing and
//! everything after it happens in the services.

use crate::{
    auth::authenticate,
    errors::AppError,
    models::video::{CreateVideoParams, Video},
    services::{
        ingest_service::{IngestError, MAX_VIDEO_BYTES},
        object_store::presign_video,
        thumbnail_service::MAX_THUMBNAIL_BYTES,
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use futures::{Stream, StreamExt};
use uuid::Uuid;

/// `POST /api/videos`
pub async fn create_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Json<CreateVideoParams>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = authenticate(&headers, &state.config.jwt_secret)?;
    let Json(params) = params.map_err(|err| AppError::bad_request(err.body_text()))?;

    let title = params.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("Title is required"));
    }

    let video = state
        .metadata
        .create_video(user_id, title, params.description.as_deref())
        .await?;
    tracing::info!(video_id = %video.id, user_id = %user_id, "video record created");

    Ok((StatusCode::CREATED, Json(video)))
}

/// `GET /api/videos`: the caller's records, newest first.
pub async fn list_videos(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Video>>, AppError> {
    let user_id = authenticate(&headers, &state.config.jwt_secret)?;
    let stored = state.metadata.list_videos(user_id).await?;

    let mut videos = Vec::with_capacity(stored.len());
    for video in stored {
        videos.push(presign_video(state.store.as_ref(), video).await?);
    }
    Ok(Json(videos))
}

/// `GET /api/videos/{video_id}`
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Video>, AppError> {
    let video = owned_video(&state, &headers, &video_id).await?;
    Ok(Json(presign_video(state.store.as_ref(), video).await?))
}

/// `DELETE /api/videos/{video_id}`
pub async fn delete_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let video = owned_video(&state, &headers, &video_id).await?;
    state.metadata.delete_video(video.id).await?;
    tracing::info!(video_id = %video.id, user_id = %video.user_id, "video record deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/video_upload/{video_id}` with an mp4 in the `video` field.
pub async fn upload_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Video>, AppError> {
    let video = owned_video(&state, &headers, &video_id).await?;
    check_declared_length(&headers, MAX_VIDEO_BYTES)?;
    let mut multipart = multipart.map_err(|err| AppError::bad_request(err.body_text()))?;

    tracing::info!(video_id = %video.id, user_id = %video.user_id, "uploading video");
    while let Some(field) = next_field(&mut multipart, MAX_VIDEO_BYTES).await? {
        if field.name() == Some("video") {
            let body = field_body(field, MAX_VIDEO_BYTES);
            let video = state.ingest.ingest_video(video, body).await?;
            return Ok(Json(video));
        }
    }
    Err(AppError::bad_request("Unable to parse form file"))
}

/// `POST /api/thumbnail_upload/{video_id}` with a jpeg or png in the
/// `thumbnail` field.
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Video>, AppError> {
    let video = owned_video(&state, &headers, &video_id).await?;
    check_declared_length(&headers, MAX_THUMBNAIL_BYTES)?;
    let mut multipart = multipart.map_err(|err| AppError::bad_request(err.body_text()))?;

    tracing::info!(video_id = %video.id, user_id = %video.user_id, "uploading thumbnail");
    while let Some(field) = next_field(&mut multipart, MAX_THUMBNAIL_BYTES).await? {
        if field.name() == Some("thumbnail") {
            let body = field_body(field, MAX_THUMBNAIL_BYTES);
            let video = state.thumbnails.upload_thumbnail(video, body).await?;
            return Ok(Json(video));
        }
    }
    Err(AppError::bad_request("Unable to parse form file"))
}

/// Parse the id, authenticate, load the record and check the caller owns it.
async fn owned_video(state: &AppState, headers: &HeaderMap, raw_id: &str) -> Result<Video, AppError> {
    let video_id = Uuid::parse_str(raw_id).map_err(|_| AppError::bad_request("Invalid ID"))?;
    let user_id = authenticate(headers, &state.config.jwt_secret)?;
    let video = state.metadata.get_video(video_id).await?;
    if !video.is_owned_by(user_id) {
        tracing::warn!(video_id = %video_id, user_id = %user_id, "caller does not own video");
        return Err(AppError::forbidden("You don't own this video"));
    }
    Ok(video)
}

/// Reject before reading anything when the client announces an oversized body.
fn check_declared_length(headers: &HeaderMap, limit: u64) -> Result<(), AppError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());
    match declared {
        Some(length) if length > limit => Err(IngestError::PayloadTooLarge(limit).into()),
        _ => Ok(()),
    }
}

async fn next_field(
    multipart: &mut Multipart,
    limit: u64,
) -> Result<Option<axum::extract::multipart::Field<'_>>, AppError> {
    multipart
        .next_field()
        .await
        .map_err(|err| multipart_error(err, limit).into())
}

fn field_body<S>(field: S, limit: u64) -> impl Stream<Item = Result<bytes::Bytes, IngestError>>
where
    S: Stream<Item = Result<bytes::Bytes, MultipartError>>,
{
    field.map(move |chunk| chunk.map_err(|err| multipart_error(err, limit)))
}

/// The body limit surfaces as a multipart error while streaming.
fn multipart_error(err: MultipartError, limit: u64) -> IngestError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        IngestError::PayloadTooLarge(limit)
    } else {
        tracing::debug!(error = %err, "malformed multipart body");
        IngestError::BadRequest("Unable to parse form file".into())
    }
}
