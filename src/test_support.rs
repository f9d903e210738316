//! In-process fakes and fixtures shared by the unit and router tests.

use crate::{
    auth::make_jwt,
    config::AppConfig,
    services::{
        ingest_service::IngestError,
        media_inspector::{Dimensions, MediaError, MediaProbe},
        media_repackager::Repackager,
        metadata_service::MetadataService,
        object_store::{ObjectStore, StoreError, StoreResult},
    },
    state::AppState,
};
use async_trait::async_trait;
use axum::response::Response;
use bytes::Bytes;
use futures::stream;
use http_body_util::BodyExt;
use sqlx::sqlite::SqlitePoolOptions;
use std::{
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tempfile::TempDir;
use uuid::Uuid;

pub const TEST_SECRET: &str = "test-secret";
pub const TEST_BUCKET: &str = "tubes";

/// A migrated SQLite database that lives as long as the pool.
pub async fn memory_metadata() -> MetadataService {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let metadata = MetadataService::new(Arc::new(pool));
    metadata.migrate().await.unwrap();
    metadata
}

/// Make every later update of `videos` fail.
pub async fn fail_video_updates(metadata: &MetadataService) {
    sqlx::query(
        "CREATE TRIGGER fail_video_updates BEFORE UPDATE ON videos
         BEGIN SELECT RAISE(ABORT, 'updates disabled'); END",
    )
    .execute(&*metadata.db)
    .await
    .unwrap();
}

/// An `ftyp` box followed by an empty `free` box.
pub fn mp4_header(major: &[u8; 4], compatible: &[&[u8; 4]]) -> Vec<u8> {
    let size = 16 + 4 * compatible.len() as u32;
    let mut data = size.to_be_bytes().to_vec();
    data.extend_from_slice(b"ftyp");
    data.extend_from_slice(major);
    data.extend_from_slice(&[0, 0, 2, 0]);
    for brand in compatible {
        data.extend_from_slice(*brand);
    }
    data.extend_from_slice(b"\0\0\0\x08free");
    data
}

/// `len` bytes that sniff as MP4.
pub fn mp4_upload(len: usize) -> Vec<u8> {
    let mut data = mp4_header(b"isom", &[b"isom", b"iso2", b"avc1", b"mp41"]);
    let mut filler = 0u8;
    data.resize_with(len.max(data.len()), || {
        filler = filler.wrapping_add(7);
        filler
    });
    data
}

/// An upload body delivered in the given chunks.
pub fn body_stream<'a>(
    chunks: impl IntoIterator<Item = &'a [u8]>,
) -> stream::Iter<std::vec::IntoIter<Result<Bytes, IngestError>>> {
    let chunks: Vec<_> = chunks
        .into_iter()
        .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
        .collect();
    stream::iter(chunks)
}

pub fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).unwrap().next().is_none()
}

/// Probe with canned dimensions.
pub struct FakeProbe {
    dimensions: Option<Dimensions>,
    calls: AtomicUsize,
}

impl FakeProbe {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            dimensions: Some(Dimensions { width, height }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            dimensions: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaProbe for FakeProbe {
    async fn probe(&self, _path: &Path) -> Result<Dimensions, MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.dimensions.ok_or(MediaError::NoStreams)
    }
}

/// Repackager that copies the input verbatim.
#[derive(Default)]
pub struct FakeRepackager {
    fail: bool,
}

impl FakeRepackager {
    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl Repackager for FakeRepackager {
    async fn repackage(&self, input: &Path, output: &Path) -> Result<(), MediaError> {
        // Leave a partial output behind, as a crashed ffmpeg would.
        tokio::fs::copy(input, output)
            .await
            .map_err(|source| MediaError::Spawn {
                tool: "fake-ffmpeg".into(),
                source,
            })?;
        if self.fail {
            return Err(MediaError::Spawn {
                tool: "fake-ffmpeg".into(),
                source: std::io::Error::other("moov atom not found"),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RecordedPut {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

/// Object store that keeps everything in memory.
#[derive(Default)]
pub struct FakeObjectStore {
    puts: Mutex<Vec<RecordedPut>>,
    deletes: Mutex<Vec<(String, String)>>,
    signed: Mutex<Vec<String>>,
    fail_put: bool,
    fail_delete: bool,
    stall_put: bool,
    stall_delete: bool,
}

impl FakeObjectStore {
    pub fn failing_put() -> Self {
        Self {
            fail_put: true,
            ..Self::default()
        }
    }

    pub fn failing_delete() -> Self {
        Self {
            fail_delete: true,
            ..Self::default()
        }
    }

    /// A store whose puts never complete.
    pub fn stalling_put() -> Self {
        Self {
            stall_put: true,
            ..Self::default()
        }
    }

    /// A store whose deletes are recorded but never complete.
    pub fn stalling_delete() -> Self {
        Self {
            stall_delete: true,
            ..Self::default()
        }
    }

    pub fn puts(&self) -> Vec<RecordedPut> {
        self.puts.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<(String, String)> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn signed(&self) -> Vec<String> {
        self.signed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StoreResult<()> {
        if self.stall_put {
            futures::future::pending::<()>().await;
        }
        if self.fail_put {
            return Err(StoreError::Write {
                key: key.to_string(),
                reason: "connection reset".into(),
            });
        }
        let body = tokio::fs::read(path).await.map_err(|e| StoreError::Write {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.puts.lock().unwrap().push(RecordedPut {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: content_type.to_string(),
            body,
        });
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.deletes
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));
        if self.stall_delete {
            futures::future::pending::<()>().await;
        }
        if self.fail_delete {
            return Err(StoreError::Delete {
                key: key.to_string(),
                reason: "access denied".into(),
            });
        }
        Ok(())
    }

    async fn sign(&self, bucket: &str, key: &str, ttl: Duration) -> StoreResult<String> {
        let url = format!("https://signed.test/{bucket}{key}?expires={}", ttl.as_secs());
        self.signed.lock().unwrap().push(url.clone());
        Ok(url)
    }
}

/// A fully wired state over fakes, temp directories and an in-memory database.
pub struct TestApp {
    pub state: AppState,
    pub probe: Arc<FakeProbe>,
    pub store: Arc<FakeObjectStore>,
    pub tmp: TempDir,
    pub assets: TempDir,
}

pub async fn test_app(platform: &str) -> TestApp {
    let tmp = tempfile::tempdir().unwrap();
    let assets = tempfile::tempdir().unwrap();
    let config = AppConfig {
        jwt_secret: TEST_SECRET.into(),
        platform: platform.into(),
        s3_bucket: TEST_BUCKET.into(),
        tmp_dir: tmp.path().to_path_buf(),
        assets_root: assets.path().to_path_buf(),
        ..AppConfig::default()
    };
    let probe = Arc::new(FakeProbe::new(1080, 1920));
    let store = Arc::new(FakeObjectStore::default());
    let state = AppState::new(
        Arc::new(config),
        memory_metadata().await,
        probe.clone(),
        Arc::new(FakeRepackager::default()),
        store.clone(),
    );
    TestApp {
        state,
        probe,
        store,
        tmp,
        assets,
    }
}

pub fn bearer(user_id: Uuid) -> String {
    format!(
        "Bearer {}",
        make_jwt(user_id, TEST_SECRET, chrono::Duration::hours(1))
    )
}

pub const BOUNDARY: &str = "video-store-test-boundary";

/// A `multipart/form-data` body with a single file part.
pub fn multipart_body(field: &str, filename: &str, content: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

pub async fn read_body(response: Response) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn read_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&read_body(response).await).unwrap()
}
