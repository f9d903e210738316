//! Core data models for the video service.
//!
//! `Video` maps to the `videos` table via `sqlx::FromRow` and serializes as
//! JSON via `serde`. `VideoRef` is the encoding of the stored-object pointer
//! kept in `videos.video_url`.

pub mod video;
pub mod video_ref;
