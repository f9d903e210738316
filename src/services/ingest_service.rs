//! Video ingestion: buffer, classify, remux, upload, commit.
//!
//! Each request walks the steps strictly in order and stops at the first
//! failure. Local buffers are `TempPath` guards registered before the file
//! they name exists, so they are removed on every exit path. The only
//! compensation is a best-effort delete of the uploaded object when the
//! metadata commit fails.

use crate::{
    models::{video::Video, video_ref::VideoRef},
    services::{
        media_inspector::{MediaError, MediaProbe, inspect_aspect_ratio},
        media_repackager::{Repackager, output_path},
        metadata_service::{MetadataError, MetadataService},
        object_store::{
            DELETE_TIMEOUT, ObjectStore, PUT_TIMEOUT, StoreError, presign_video, with_deadline,
        },
        sniff::{VIDEO_MP4, detect_content_type, read_head},
    },
};
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use std::{
    io,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};
use tempfile::TempPath;
use thiserror::Error;
use tokio::{fs::File, io::AsyncWriteExt};
use uuid::Uuid;

/// Ceiling for a whole video upload request body.
pub const MAX_VIDEO_BYTES: u64 = 1 << 30;

const VIDEO_TYPES: &[&str] = &[VIDEO_MP4];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    BadRequest(String),
    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(u64),
    #[error("unsupported content type `{sniffed}`")]
    UnsupportedMediaType {
        sniffed: String,
        allowed: &'static [&'static str],
    },
    #[error("empty upload")]
    EmptyUpload,
    #[error("local buffer i/o: {0}")]
    Io(#[from] io::Error),
    #[error("probe failed: {0}")]
    Probe(#[source] MediaError),
    #[error("repackage failed: {0}")]
    Repackage(#[source] MediaError),
    #[error(transparent)]
    StoreWrite(StoreError),
    #[error(transparent)]
    Sign(StoreError),
    #[error("metadata commit failed: {0}")]
    Commit(#[source] MetadataError),
}

pub type IngestResult<T> = Result<T, IngestError>;

impl IngestError {
    /// The message shown to clients. Internal causes stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            IngestError::BadRequest(_)
            | IngestError::PayloadTooLarge(_)
            | IngestError::UnsupportedMediaType { .. } => self.to_string(),
            IngestError::EmptyUpload => "Uploaded file is empty".into(),
            IngestError::Io(_) => "Couldn't buffer upload".into(),
            IngestError::Probe(_) => "Couldn't determine aspect ratio".into(),
            IngestError::Repackage(_) => "Couldn't process video".into(),
            IngestError::StoreWrite(_) => "Couldn't upload video".into(),
            IngestError::Sign(_) => "Couldn't resolve video URL".into(),
            IngestError::Commit(_) => "Couldn't update video".into(),
        }
    }
}

/// Reject anything whose leading bytes are not one of `allowed`.
pub(crate) fn require_content_type(
    head: &[u8],
    allowed: &'static [&'static str],
) -> IngestResult<&'static str> {
    let sniffed = detect_content_type(head);
    if allowed.contains(&sniffed) {
        Ok(sniffed)
    } else {
        Err(IngestError::UnsupportedMediaType {
            sniffed: sniffed.to_string(),
            allowed,
        })
    }
}

#[derive(Clone)]
pub struct IngestService {
    metadata: MetadataService,
    probe: Arc<dyn MediaProbe>,
    repackager: Arc<dyn Repackager>,
    store: Arc<dyn ObjectStore>,
    bucket: String,
    tmp_dir: PathBuf,
    put_timeout: Duration,
    delete_timeout: Duration,
}

impl IngestService {
    pub fn new(
        metadata: MetadataService,
        probe: Arc<dyn MediaProbe>,
        repackager: Arc<dyn Repackager>,
        store: Arc<dyn ObjectStore>,
        bucket: String,
        tmp_dir: PathBuf,
    ) -> Self {
        Self {
            metadata,
            probe,
            repackager,
            store,
            bucket,
            tmp_dir,
            put_timeout: PUT_TIMEOUT,
            delete_timeout: DELETE_TIMEOUT,
        }
    }

    #[cfg(test)]
    pub fn with_store_deadlines(mut self, put: Duration, delete: Duration) -> Self {
        self.put_timeout = put;
        self.delete_timeout = delete;
        self
    }

    /// Run the pipeline for an already authorized `video` and the raw bytes of
    /// its file part. Returns the committed record with a presigned URL.
    pub async fn ingest_video<S>(&self, mut video: Video, body: S) -> IngestResult<Video>
    where
        S: Stream<Item = Result<Bytes, IngestError>> + Send,
    {
        let start = Instant::now();
        pin_mut!(body);

        // An empty body sniffs as octet-stream and is rejected here.
        let head = read_head(&mut body).await?;
        let content_type = require_content_type(&head, VIDEO_TYPES)?;

        // Buffer
        let (upload, size_bytes) = self.buffer(head, &mut body).await?;
        tracing::debug!(
            video_id = %video.id,
            path = %upload.display(),
            size_bytes,
            "buffered upload"
        );

        // Classify
        let aspect = inspect_aspect_ratio(self.probe.as_ref(), &upload)
            .await
            .map_err(IngestError::Probe)?;

        // Repackage
        let processed = TempPath::try_from_path(output_path(&upload))?;
        self.repackager
            .repackage(&upload, &processed)
            .await
            .map_err(IngestError::Repackage)?;

        // Upload
        let key = format!("/{}/{}.mp4", aspect.key_prefix(), Uuid::new_v4());
        with_deadline(
            self.put_timeout,
            &key,
            self.store.put(&self.bucket, &key, &processed, content_type),
        )
        .await
        .map_err(IngestError::StoreWrite)?;

        // Commit
        video.video_url = Some(VideoRef::new(&self.bucket, &key).encode());
        let committed = match self.metadata.update_video(&video).await {
            Ok(committed) => committed,
            Err(err) => {
                self.discard_object(&key).await;
                return Err(IngestError::Commit(err));
            }
        };

        let response = presign_video(self.store.as_ref(), committed)
            .await
            .map_err(IngestError::Sign)?;

        tracing::info!(
            video_id = %video.id,
            user_id = %video.user_id,
            bucket = %self.bucket,
            key = %key,
            aspect = %aspect,
            size_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "video ingested"
        );
        Ok(response)
    }

    /// Copy `head` and the rest of `body` into a fresh temp file.
    async fn buffer<S>(&self, head: Bytes, body: &mut S) -> IngestResult<(TempPath, u64)>
    where
        S: Stream<Item = Result<Bytes, IngestError>> + Unpin,
    {
        let (file, path) = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".mp4")
            .tempfile_in(&self.tmp_dir)?
            .into_parts();
        let mut file = File::from_std(file);

        file.write_all(&head).await?;
        let mut size_bytes = head.len() as u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            size_bytes += chunk.len() as u64;
        }
        file.flush().await?;

        if file.metadata().await?.len() == 0 {
            return Err(IngestError::EmptyUpload);
        }
        Ok((path, size_bytes))
    }

    /// Compensation for a failed commit. A failure or timeout here leaves an
    /// orphan; the caller's error response never waits past the deadline.
    async fn discard_object(&self, key: &str) {
        let delete = self.store.delete(&self.bucket, key);
        match with_deadline(self.delete_timeout, key, delete).await {
            Ok(()) => tracing::warn!(
                bucket = %self.bucket,
                key = %key,
                "removed uploaded object after failed commit"
            ),
            Err(err) => tracing::error!(
                error = %err,
                bucket = %self.bucket,
                key = %key,
                "could not remove uploaded object after failed commit; object is orphaned"
            ),
        }
    }
}
