//! Shared handler state.

use crate::{
    config::AppConfig,
    services::{
        ingest_service::IngestService, media_inspector::MediaProbe,
        media_repackager::Repackager, metadata_service::MetadataService,
        object_store::ObjectStore, thumbnail_service::ThumbnailService,
    },
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub metadata: MetadataService,
    pub ingest: IngestService,
    pub thumbnails: ThumbnailService,
    pub store: Arc<dyn ObjectStore>,
}

impl AppState {
    /// Wire the services around the given capabilities.
    pub fn new(
        config: Arc<AppConfig>,
        metadata: MetadataService,
        probe: Arc<dyn MediaProbe>,
        repackager: Arc<dyn Repackager>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        let ingest = IngestService::new(
            metadata.clone(),
            probe,
            repackager,
            store.clone(),
            config.s3_bucket.clone(),
            config.tmp_dir.clone(),
        );
        let thumbnails = ThumbnailService::new(
            metadata.clone(),
            store.clone(),
            config.assets_root.clone(),
            config.public_base_url.clone(),
        );
        Self {
            config,
            metadata,
            ingest,
            thumbnails,
            store,
        }
    }
}
