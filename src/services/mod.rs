pub mod ingest_service;
pub mod media_inspector;
pub mod media_repackager;
pub mod metadata_service;
pub mod object_store;
pub mod sniff;
pub mod thumbnail_service;
