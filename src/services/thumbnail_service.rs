//! Thumbnail uploads into the locally served assets directory.

use crate::{
    models::video::Video,
    services::{
        ingest_service::{IngestError, IngestResult, require_content_type},
        metadata_service::MetadataService,
        object_store::{ObjectStore, presign_video},
        sniff::{IMAGE_JPEG, IMAGE_PNG, read_head},
    },
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use rand::Rng;
use std::{path::PathBuf, sync::Arc};
use tokio::{fs, fs::File, io::AsyncWriteExt};

/// Ceiling for a whole thumbnail upload request body.
pub const MAX_THUMBNAIL_BYTES: u64 = 10 << 20;

const THUMBNAIL_TYPES: &[&str] = &[IMAGE_JPEG, IMAGE_PNG];

#[derive(Clone)]
pub struct ThumbnailService {
    metadata: MetadataService,
    store: Arc<dyn ObjectStore>,
    assets_root: PathBuf,
    public_base_url: String,
}

impl ThumbnailService {
    pub fn new(
        metadata: MetadataService,
        store: Arc<dyn ObjectStore>,
        assets_root: PathBuf,
        public_base_url: String,
    ) -> Self {
        Self {
            metadata,
            store,
            assets_root,
            public_base_url,
        }
    }

    /// Store the image under a fresh random name and point the record at it.
    ///
    /// The file is written to a hidden temp name and renamed into place, so
    /// readers of `/assets` never see a partial image. It is removed again if
    /// the record cannot be updated.
    pub async fn upload_thumbnail<S>(&self, mut video: Video, body: S) -> IngestResult<Video>
    where
        S: Stream<Item = Result<Bytes, IngestError>> + Send,
    {
        pin_mut!(body);

        let head = read_head(&mut body).await?;
        let content_type = require_content_type(&head, THUMBNAIL_TYPES)?;

        let (file, tmp_path) = tempfile::Builder::new()
            .prefix(".tmp-")
            .tempfile_in(&self.assets_root)?
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
        drop(file);

        let name = asset_name(content_type);
        let asset_path = self.assets_root.join(&name);
        tmp_path
            .persist(&asset_path)
            .map_err(|err| IngestError::Io(err.error))?;

        video.thumbnail_url = Some(format!("{}/assets/{}", self.public_base_url, name));
        let committed = match self.metadata.update_video(&video).await {
            Ok(committed) => committed,
            Err(err) => {
                if let Err(remove_err) = fs::remove_file(&asset_path).await {
                    tracing::warn!(
                        error = %remove_err,
                        path = %asset_path.display(),
                        "could not remove thumbnail after failed commit"
                    );
                }
                return Err(IngestError::Commit(err));
            }
        };

        tracing::info!(
            video_id = %video.id,
            user_id = %video.user_id,
            asset = %name,
            content_type,
            size_bytes,
            "thumbnail stored"
        );

        presign_video(self.store.as_ref(), committed)
            .await
            .map_err(IngestError::Sign)
    }
}

/// 32 random bytes, URL-safe base64, with an extension for the sniffed type.
fn asset_name(content_type: &str) -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    let extension = if content_type == IMAGE_PNG { "png" } else { "jpg" };
    format!("{}.{}", URL_SAFE_NO_PAD.encode(bytes), extension)
}
