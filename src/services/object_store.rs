//! Object store gateway: put, best-effort delete, and presigned GET URLs.

use crate::models::{
    video::Video,
    video_ref::{VideoRef, VideoRefError},
};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, meta::region::RegionProviderChain};
use aws_sdk_s3::{Client, presigning::PresigningConfig, primitives::ByteStream};
use std::{
    path::Path,
    time::{Duration, Instant},
};
use thiserror::Error;

/// Deadline for a single put; the upload is abandoned after it.
pub const PUT_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for a compensating delete.
pub const DELETE_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifetime of URLs handed to clients.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(60 * 60);

/// Keys are never reused, so stored content is immutable.
const CACHE_CONTROL: &str = "public, max-age=31536000";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("upload of `{key}` failed: {reason}")]
    Write { key: String, reason: String },
    #[error("store operation on `{key}` did not finish within {}ms", .timeout.as_millis())]
    Timeout { key: String, timeout: Duration },
    #[error("delete of `{key}` failed: {reason}")]
    Delete { key: String, reason: String },
    #[error("signing `{key}` failed: {reason}")]
    Sign { key: String, reason: String },
    #[error(transparent)]
    Reference(#[from] VideoRefError),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `path` under `bucket`/`key`.
    async fn put(&self, bucket: &str, key: &str, path: &Path, content_type: &str)
    -> StoreResult<()>;

    async fn delete(&self, bucket: &str, key: &str) -> StoreResult<()>;

    /// A URL granting read access to `bucket`/`key` for `ttl`. The object is
    /// not checked for existence.
    async fn sign(&self, bucket: &str, key: &str, ttl: Duration) -> StoreResult<String>;
}

/// Abandon `operation` on `key` once `deadline` passes.
pub async fn with_deadline<T>(
    deadline: Duration,
    key: &str,
    operation: impl Future<Output = StoreResult<T>>,
) -> StoreResult<T> {
    match tokio::time::timeout(deadline, operation).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout {
            key: key.to_string(),
            timeout: deadline,
        }),
    }
}

/// Replace the stored composite reference with a fresh presigned URL.
/// Records without a video pass through unchanged.
pub async fn presign_video(store: &dyn ObjectStore, mut video: Video) -> StoreResult<Video> {
    let Some(raw) = video.video_url.as_deref() else {
        return Ok(video);
    };
    let reference: VideoRef = raw.parse()?;
    let url = store
        .sign(&reference.bucket, &reference.key, SIGNED_URL_TTL)
        .await?;
    video.video_url = Some(url);
    Ok(video)
}

/// S3 (or S3-compatible) implementation.
#[derive(Clone)]
pub struct S3Gateway {
    client: Client,
}

impl S3Gateway {
    /// Build a client from the default credential chain.
    ///
    /// `endpoint_url` targets S3-compatible providers (MinIO and friends),
    /// which need path-style addressing.
    pub async fn new(region: String, endpoint_url: Option<String>) -> Self {
        let region_provider = RegionProviderChain::first_try(aws_config::Region::new(region));
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let client = match endpoint_url {
            Some(endpoint) => {
                let s3_config = aws_sdk_s3::config::Builder::from(&config)
                    .endpoint_url(endpoint)
                    .force_path_style(true)
                    .build();
                Client::from_conf(s3_config)
            }
            None => Client::new(&config),
        };

        Self { client }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StoreResult<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StoreError::Write {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .cache_control(CACHE_CONTROL)
            .send()
            .await
            .map_err(|e| StoreError::Write {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Gateway {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StoreResult<()> {
        let start = Instant::now();
        let result = self.put_object(bucket, key, path, content_type).await;

        match &result {
            Ok(()) => tracing::info!(
                bucket = %bucket,
                key = %key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload successful"
            ),
            Err(e) => tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            ),
        }
        result
    }

    async fn delete(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Delete {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(bucket = %bucket, key = %key, "S3 delete successful");
        Ok(())
    }

    async fn sign(&self, bucket: &str, key: &str, ttl: Duration) -> StoreResult<String> {
        let sign_error = |reason: String| StoreError::Sign {
            key: key.to_string(),
            reason,
        };
        let presigning_config = PresigningConfig::expires_in(ttl)
            .map_err(|e| sign_error(e.to_string()))?;

        let presigned_request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| sign_error(e.to_string()))?;

        Ok(presigned_request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeObjectStore;
    use chrono::Utc;
    use uuid::Uuid;

    fn video_with(url: Option<&str>) -> Video {
        Video {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            title: "t".into(),
            description: None,
            thumbnail_url: None,
            video_url: url.map(str::to_string),
            user_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn presign_swaps_reference_for_url() {
        let store = FakeObjectStore::default();
        let video = presign_video(&store, video_with(Some("tubes,/portrait/a.mp4")))
            .await
            .unwrap();

        let url = video.video_url.unwrap();
        assert!(url.starts_with("https://signed.test/tubes/portrait/a.mp4"));
        assert!(url.contains("expires=3600"));
    }

    #[tokio::test]
    async fn presign_leaves_records_without_video() {
        let store = FakeObjectStore::default();
        let video = presign_video(&store, video_with(None)).await.unwrap();
        assert!(video.video_url.is_none());
        assert!(store.signed().is_empty());
    }

    #[tokio::test]
    async fn presign_rejects_corrupt_reference() {
        let store = FakeObjectStore::default();
        let err = presign_video(&store, video_with(Some("https://example.com/a.mp4")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Reference(_)));
    }

    #[tokio::test]
    async fn stalled_operation_times_out() {
        let err = with_deadline(
            Duration::from_millis(20),
            "/landscape/a.mp4",
            futures::future::pending::<StoreResult<()>>(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            StoreError::Timeout { ref key, timeout }
                if key == "/landscape/a.mp4" && timeout == Duration::from_millis(20)
        ));
    }

    #[tokio::test]
    async fn s3_gateway_signs_without_contacting_store() {
        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .credentials_provider(aws_sdk_s3::config::Credentials::new(
                "AKIDEXAMPLE",
                "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
                None,
                None,
                "test",
            ))
            .endpoint_url("http://127.0.0.1:9000")
            .force_path_style(true)
            .build();
        let gateway = S3Gateway {
            client: Client::from_conf(s3_config),
        };

        let url = gateway
            .sign("tubes", "/landscape/abc.mp4", SIGNED_URL_TTL)
            .await
            .unwrap();

        assert!(url.starts_with("http://127.0.0.1:9000/tubes/"));
        assert!(url.contains("X-Amz-Expires=3600"));
        assert!(url.contains("X-Amz-Signature="));
    }
}
