//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness: database plus the two local directories

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::{collections::HashMap, path::Path};
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`
///
/// Liveness probe. Never performs I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Runs `SELECT 1` against SQLite.
/// 2. Writes, reads back and deletes a marker file in the assets root and in
///    the upload temp directory.
///
/// HTTP 200 when all checks pass, HTTP 503 when any fails.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let sqlite = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&*state.metadata.db)
        .await
    {
        Ok(1) => CheckStatus::ok(),
        Ok(v) => CheckStatus::failed(format!("unexpected result: {}", v)),
        Err(e) => CheckStatus::failed(format!("error: {}", e)),
    };
    let assets = disk_check(&state.config.assets_root).await;
    let tmp = disk_check(&state.config.tmp_dir).await;

    let overall_ok = sqlite.ok && assets.ok && tmp.ok;
    let checks = HashMap::from([("sqlite", sqlite), ("assets", assets), ("tmp", tmp)]);

    let body = ReadyResponse {
        status: if overall_ok { "ok" } else { "error" }.into(),
        checks,
    };
    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

async fn disk_check(dir: &Path) -> CheckStatus {
    let marker = dir.join(format!(".readyz-{}", Uuid::new_v4()));
    if let Err(e) = fs::write(&marker, b"readyz").await {
        return CheckStatus::failed(format!("could not write tmp file: {}", e));
    }
    let status = match fs::read(&marker).await {
        Ok(bytes) if bytes == b"readyz" => CheckStatus::ok(),
        Ok(_) => CheckStatus::failed("file content mismatch".into()),
        Err(e) => CheckStatus::failed(format!("could not read tmp file: {}", e)),
    };
    // best-effort cleanup
    if let Err(e) = fs::remove_file(&marker).await {
        tracing::warn!(error = %e, path = %marker.display(), "could not remove readiness marker");
    }
    status
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            ok: false,
            error: Some(error),
        }
    }
}
