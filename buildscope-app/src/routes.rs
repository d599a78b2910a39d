use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::response::Html;
use axum::routing::post;
use axum::{Json, Router};
use buildscope_core::aggregator::Aggregator;
use buildscope_core::report::render_html;
use buildscope_core::types::AnalysisRun;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::errors::{AppError, Result};

/// Multipart field carrying the build log.
pub const LOG_FIELD: &str = "log";

/// Upload limit for a single request.
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone)]
struct AppState {
    aggregator: Arc<Aggregator>,
}

pub fn create_route(aggregator: Aggregator) -> Router {
    let state = AppState {
        aggregator: Arc::new(aggregator),
    };
    Router::new()
        .route("/analyze/", post(analyze))
        .route("/analyze/report", post(analyze_report))
        .route("/analyze/full", post(analyze_full))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AnalyzeResponse {
    pub result: String,
}

#[tracing::instrument(level = "INFO", skip_all)]
async fn analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>> {
    let run = run_upload(&state, multipart).await?;
    Ok(Json(AnalyzeResponse {
        result: run.summary.text,
    }))
}

#[tracing::instrument(level = "INFO", skip_all)]
async fn analyze_report(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Html<String>> {
    let run = run_upload(&state, multipart).await?;
    Ok(Html(render_html(&run)))
}

#[tracing::instrument(level = "INFO", skip_all)]
async fn analyze_full(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Map<String, Value>>> {
    let run = run_upload(&state, multipart).await?;
    Ok(Json(run.to_result_map()))
}

async fn run_upload(state: &AppState, multipart: Multipart) -> Result<AnalysisRun> {
    let log = read_log(multipart).await?;
    info!("Analyzing uploaded log of {} bytes", log.len());
    Ok(state.aggregator.analyze(&log).await)
}

async fn read_log(mut multipart: Multipart) -> Result<String> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(LOG_FIELD) {
            continue;
        }
        let bytes = field.bytes().await?;
        return Ok(decode_lossy(bytes.to_vec()));
    }
    Err(AppError::missing_field(LOG_FIELD))
}

pub fn decode_lossy(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            warn!(
                "Uploaded log is not valid UTF-8 ({}); decoding lossily",
                err.utf8_error()
            );
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use buildscope_core::config::AnalysisSettings;
    use buildscope_core::invoker::{ResilientInvoker, NO_BACKEND_MESSAGE};
    use buildscope_core::tools::ToolRegistry;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "buildscope-test-boundary";

    fn router() -> (Router, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let aggregator = Aggregator::new(
            ToolRegistry::standard(),
            ResilientInvoker::new(Vec::new()),
            AnalysisSettings {
                project_root: dir.path().to_path_buf(),
                unit_timeout: None,
            },
        );
        (create_route(aggregator), dir)
    }

    fn multipart_request(uri: &str, field: &str, content: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
                 filename=\"build.log\"\r\nContent-Type: text/plain\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn simple_mode_returns_synthesis_text() {
        let (app, _dir) = router();
        let response = app
            .oneshot(multipart_request(
                "/analyze/",
                LOG_FIELD,
                b"BUILD FAILURE: NullPointerException at Foo.java:10",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: AnalyzeResponse = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(body.result.contains(NO_BACKEND_MESSAGE));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn full_mode_returns_every_tool() {
        let (app, _dir) = router();
        let response = app
            .oneshot(multipart_request("/analyze/full", LOG_FIELD, b"Error: boom\n"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let map: Map<String, Value> = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(map["build_status"], Value::String("Build failed.".to_string()));
        assert!(map.contains_key("summary"));
        assert!(map.contains_key("elapsed_time"));
        assert_eq!(map.len(), ToolRegistry::standard().len() + 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn report_mode_returns_html() {
        let (app, _dir) = router();
        let response = app
            .oneshot(multipart_request("/analyze/report", LOG_FIELD, &[0xff, b'o', b'k']))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<th>build_status</th>"));
    }

    #[tokio::test]
    async fn missing_log_field_is_bad_request() {
        let (app, _dir) = router();
        let response = app
            .oneshot(multipart_request("/analyze/", "file", b"whatever"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_text(response).await;
        assert!(body.contains("40002"));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        assert_eq!(decode_lossy(vec![b'a', 0xff, b'b']), "a\u{FFFD}b");
        assert_eq!(decode_lossy(b"plain".to_vec()), "plain");
    }
}
