//! Serves thumbnails from the assets directory.

use crate::{errors::AppError, state::AppState};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use std::io::ErrorKind;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

/// `GET /assets/{file}`
pub async fn get_asset(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    if !is_servable_name(&name) {
        return Err(AppError::not_found("Asset not found"));
    }

    let path = state.config.assets_root.join(&name);
    let file = match File::open(&path).await {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(AppError::not_found("Asset not found"));
        }
        Err(err) => {
            tracing::error!(error = %err, path = %path.display(), "could not open asset");
            return Err(AppError::internal("Couldn't read asset"));
        }
    };

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(&name)),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}

/// Plain file names only. Hidden names cover in-flight `.tmp-` writes.
fn is_servable_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}

fn content_type_for(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        routes::routes::routes,
        test_support::{read_body, test_app},
    };
    use axum::http::Request;
    use tower::ServiceExt;

    #[test]
    fn rejects_traversal_and_hidden_names() {
        assert!(is_servable_name("abc_DEF-123.png"));
        assert!(!is_servable_name(""));
        assert!(!is_servable_name("..png"));
        assert!(!is_servable_name("a/b.png"));
        assert!(!is_servable_name("a\\b.png"));
        assert!(!is_servable_name(".tmp-1234"));
    }

    #[tokio::test]
    async fn serves_stored_asset_without_caching() {
        let app = test_app("prod").await;
        std::fs::write(app.assets.path().join("thumb.png"), b"png-bytes").unwrap();

        let request = Request::builder()
            .uri("/assets/thumb.png")
            .body(Body::empty())
            .unwrap();
        let response = routes()
            .with_state(app.state.clone())
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(&read_body(response).await[..], b"png-bytes");
    }

    #[tokio::test]
    async fn missing_asset_is_404() {
        let app = test_app("prod").await;
        let request = Request::builder()
            .uri("/assets/nope.jpg")
            .body(Body::empty())
            .unwrap();
        let response = routes()
            .with_state(app.state.clone())
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
