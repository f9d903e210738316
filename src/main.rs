use anyhow::Result;
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;
#[cfg(test)]
mod test_support;

use services::{
    media_inspector::FfprobeInspector, media_repackager::FfmpegRepackager,
    metadata_service::MetadataService, object_store::S3Gateway,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!(
        addr = %cfg.addr(),
        platform = %cfg.platform,
        bucket = %cfg.s3_bucket,
        region = %cfg.s3_region,
        assets_root = %cfg.assets_root.display(),
        tmp_dir = %cfg.tmp_dir.display(),
        "Starting video-store"
    );

    // --- Ensure local directories exist ---
    for dir in [&cfg.assets_root, &cfg.tmp_dir] {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
            tracing::info!("Created directory at {}", dir.display());
        }
    }

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let connect_url = if db_url.contains('?') || db_url.contains(":memory:") {
        db_url.clone()
    } else {
        format!("{}?mode=rwc", db_url)
    };
    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&connect_url)
            .await?,
    );
    let metadata = MetadataService::new(db);

    // --- Handle migration mode ---
    if migrate {
        let applied = metadata.migrate().await?;
        tracing::info!("Database migration complete ({} statements).", applied);
        return Ok(()); // exit after migration
    }

    // --- Initialize external capabilities ---
    let store = S3Gateway::new(cfg.s3_region.clone(), cfg.s3_endpoint.clone()).await;
    let probe = FfprobeInspector::new(&cfg.ffprobe_path);
    let repackager = FfmpegRepackager::new(&cfg.ffmpeg_path);

    let cfg = Arc::new(cfg);
    let state = state::AppState::new(
        cfg.clone(),
        metadata,
        Arc::new(probe),
        Arc::new(repackager),
        Arc::new(store),
    );

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
