//! Router construction and server host for the API.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Request, StatusCode},
    middleware,
    routing::{get, post},
};
use pdfpress_config::ServiceConfig;
use pdfpress_core::CompressionService;
use pdfpress_telemetry::{Metrics, build_sha};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{Span, info};

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::compress::compress;
use crate::http::constants::HEADER_REQUEST_ID;
use crate::http::convert::convert_word;
use crate::http::download::download;
use crate::http::health::{health, metrics};
use crate::http::telemetry::track_requests;
use crate::state::ApiState;

/// Axum router wrapper that hosts the pdfpress HTTP surface.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Wire `service` behind the HTTP routes, applying the body limit and
    /// request timeout from `config`.
    #[must_use]
    pub fn new(service: CompressionService, telemetry: Metrics, config: &ServiceConfig) -> Self {
        let state = Arc::new(ApiState::new(service, telemetry));
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();

                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(pdfpress_telemetry::set_request_id_layer())
            .layer(trace_layer)
            .layer(pdfpress_telemetry::propagate_request_id_layer())
            .layer(middleware::from_fn_with_state(
                Arc::clone(&state),
                track_requests,
            ));
        let timeout =
            TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, config.request_timeout);

        let router = Self::routes()
            .route_layer(layered)
            .layer(DefaultBodyLimit::max(config.max_upload_bytes()))
            .layer(timeout)
            .with_state(state);

        Self { router }
    }

    fn routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .route("/compress", post(compress))
            .route("/convert-word", post(convert_word))
            .route("/download/{filename}", get(download))
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or the server terminates unexpectedly.
    pub async fn serve<F>(self, addr: SocketAddr, shutdown: F) -> ApiServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        info!(addr = %addr, "api listening");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }

    /// Consume the server and return the configured router.
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{
        StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    };
    use axum::response::Response;
    use pdfpress_core::{
        CompressionPipeline, DocxWriter, Profile, ToolError, Transform, WordConverter,
    };
    use pdfpress_test_support::fixtures::{pdf_payload, scratch_dir};
    use std::error::Error;
    use std::path::Path;
    use std::sync::Mutex;
    use tower::ServiceExt;

    use crate::models::{CompressResponse, ConvertResponse, HealthResponse, ProblemDetails};

    const BOUNDARY: &str = "pdfpress-test-boundary";

    fn spawn_error(program: &str, source: std::io::Error) -> ToolError {
        ToolError::Spawn {
            program: program.to_string(),
            source,
        }
    }

    /// Writes the first half of its input.
    struct Halve(&'static str);

    #[async_trait]
    impl Transform for Halve {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn transform(&self, input: &Path, output: &Path, _: Profile) -> Result<(), ToolError> {
            let bytes = tokio::fs::read(input)
                .await
                .map_err(|err| spawn_error("gs", err))?;
            tokio::fs::write(output, &bytes[..bytes.len() / 2])
                .await
                .map_err(|err| spawn_error("gs", err))
        }
    }

    /// Never finishes within a test's request timeout.
    struct Stall;

    #[async_trait]
    impl Transform for Stall {
        fn name(&self) -> &'static str {
            "render"
        }

        async fn transform(&self, _: &Path, _: &Path, _: Profile) -> Result<(), ToolError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(ToolError::Missing {
                program: "gs".into(),
            })
        }
    }

    struct Missing;

    #[async_trait]
    impl Transform for Missing {
        fn name(&self) -> &'static str {
            "render"
        }

        async fn transform(&self, _: &Path, _: &Path, _: Profile) -> Result<(), ToolError> {
            Err(ToolError::Missing {
                program: "gs".into(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingWriter {
        sorts: Mutex<Vec<bool>>,
    }

    #[async_trait]
    impl DocxWriter for RecordingWriter {
        async fn write_docx(&self, _: &Path, output: &Path, sort: bool) -> Result<(), ToolError> {
            if let Ok(mut sorts) = self.sorts.lock() {
                sorts.push(sort);
            }
            tokio::fs::write(output, b"PK-docx")
                .await
                .map_err(|err| spawn_error("python3", err))
        }
    }

    struct Harness {
        router: Router,
        writer: Arc<RecordingWriter>,
        _dir: tempfile::TempDir,
    }

    fn harness(render: Arc<dyn Transform>) -> Result<Harness, Box<dyn Error>> {
        harness_with_timeout(render, ServiceConfig::default().request_timeout)
    }

    fn harness_with_timeout(
        render: Arc<dyn Transform>,
        request_timeout: Duration,
    ) -> Result<Harness, Box<dyn Error>> {
        let dir = scratch_dir()?;
        let writer = Arc::new(RecordingWriter::default());
        let metrics = Metrics::new()?;
        let service = CompressionService::new(
            CompressionPipeline::new(render, Arc::new(Halve("structure"))),
            WordConverter::new(Arc::new(Halve("strip")), writer.clone()),
            dir.path(),
            2,
            metrics.clone(),
        );
        let config = ServiceConfig {
            upload_dir: dir.path().to_path_buf(),
            max_upload_size_mb: 1,
            request_timeout,
            ..ServiceConfig::default()
        };
        Ok(Harness {
            router: ApiServer::new(service, metrics, &config).into_router(),
            writer,
            _dir: dir,
        })
    }

    fn multipart(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file_name, content) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            let disposition = file_name.map_or_else(
                || format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"),
                |file| {
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file}\"\r\nContent-Type: application/pdf\r\n\r\n"
                    )
                },
            );
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn post_form(
        router: &Router,
        uri: &str,
        parts: &[(&str, Option<&str>, &[u8])],
    ) -> Result<Response, Box<dyn Error>> {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart(parts)))?;
        Ok(router.clone().oneshot(request).await?)
    }

    async fn get(router: &Router, uri: &str) -> Result<Response, Box<dyn Error>> {
        let request = Request::builder().uri(uri).body(Body::empty())?;
        Ok(router.clone().oneshot(request).await?)
    }

    async fn json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, Box<dyn Error>> {
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    #[tokio::test]
    async fn health_reports_ok_with_request_id() -> Result<(), Box<dyn Error>> {
        let harness = harness(Arc::new(Halve("render")))?;
        let response = get(&harness.router, "/health").await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(HEADER_REQUEST_ID));
        let body: HealthResponse = json(response).await?;
        assert_eq!(body.status, "ok");
        assert_eq!(body.active_jobs, 0);
        Ok(())
    }

    #[tokio::test]
    async fn metrics_count_previous_requests() -> Result<(), Box<dyn Error>> {
        let harness = harness(Arc::new(Halve("render")))?;
        get(&harness.router, "/health").await?;
        let response = get(&harness.router, "/metrics").await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let text = String::from_utf8(body.to_vec())?;
        assert!(text.contains("http_requests_total"));
        assert!(text.contains("/health"));
        Ok(())
    }

    #[tokio::test]
    async fn single_upload_is_delivered_directly() -> Result<(), Box<dyn Error>> {
        let harness = harness(Arc::new(Halve("render")))?;
        let payload = pdf_payload(4096);
        let response = post_form(
            &harness.router,
            "/compress",
            &[("pdf", Some("report.pdf"), &payload), ("level", None, b"screen")],
        )
        .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body: CompressResponse = json(response).await?;
        assert_eq!(body.title, "report.pdf");
        assert_eq!(body.profile, Profile::Screen);
        assert_eq!(body.totals.original_bytes, 4096);
        assert!(body.totals.final_bytes < 4096);
        assert!(body.failed.is_empty());
        assert_eq!(body.download_url, format!("/download/{}", body.download));

        let response = get(&harness.router, &body.download_url).await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).map(|v| v.as_bytes()),
            Some(b"application/pdf".as_slice())
        );
        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(disposition.starts_with("attachment;"));
        assert_eq!(
            response.headers().get(CONTENT_LENGTH).map(|v| v.as_bytes().to_vec()),
            Some(body.totals.final_bytes.to_string().into_bytes())
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        assert_eq!(bytes.len() as u64, body.totals.final_bytes);
        Ok(())
    }

    #[tokio::test]
    async fn several_uploads_are_archived() -> Result<(), Box<dyn Error>> {
        let harness = harness(Arc::new(Halve("render")))?;
        let first = pdf_payload(2048);
        let second = pdf_payload(1024);
        let response = post_form(
            &harness.router,
            "/compress",
            &[("pdf", Some("a.pdf"), &first), ("pdf", Some("b.pdf"), &second)],
        )
        .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body: CompressResponse = json(response).await?;
        assert_eq!(body.title, "Archive created from 2 files");
        assert_eq!(body.profile, Profile::Ebook);
        assert_eq!(
            body.items.iter().map(|item| item.name.as_str()).collect::<Vec<_>>(),
            ["a.pdf", "b.pdf"]
        );
        assert!(body.download.ends_with(".zip"));

        let response = get(&harness.router, &body.download_url).await?;
        assert_eq!(
            response.headers().get(CONTENT_TYPE).map(|v| v.as_bytes()),
            Some(b"application/zip".as_slice())
        );
        Ok(())
    }

    #[tokio::test]
    async fn unknown_level_is_rejected() -> Result<(), Box<dyn Error>> {
        let harness = harness(Arc::new(Halve("render")))?;
        let payload = pdf_payload(512);
        let response = post_form(
            &harness.router,
            "/compress",
            &[("pdf", Some("a.pdf"), &payload), ("level", None, b"ultra")],
        )
        .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let request_id = response
            .headers()
            .get(HEADER_REQUEST_ID)
            .ok_or("missing request id")?
            .to_str()?
            .to_owned();
        let problem: ProblemDetails = json(response).await?;
        assert_eq!(problem.request_id, Some(request_id));
        let params = problem.invalid_params.ok_or("missing invalid params")?;
        assert_eq!(params[0].pointer, "/level");
        Ok(())
    }

    #[tokio::test]
    async fn empty_form_is_rejected() -> Result<(), Box<dyn Error>> {
        let harness = harness(Arc::new(Halve("render")))?;
        let response = post_form(&harness.router, "/compress", &[("level", None, b"ebook")]).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let problem: ProblemDetails = json(response).await?;
        let params = problem.invalid_params.ok_or("missing invalid params")?;
        assert_eq!(params[0].pointer, "/files");
        assert_eq!(params[0].message, "empty_submission");
        Ok(())
    }

    #[tokio::test]
    async fn all_failures_are_a_server_problem() -> Result<(), Box<dyn Error>> {
        let harness = harness(Arc::new(Missing))?;
        let payload = pdf_payload(512);
        let response = post_form(
            &harness.router,
            "/compress",
            &[("pdf", Some("a.pdf"), &payload), ("pdf", Some("b.pdf"), &payload)],
        )
        .await?;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let problem: ProblemDetails = json(response).await?;
        assert_eq!(problem.title, "processing failed");
        Ok(())
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() -> Result<(), Box<dyn Error>> {
        let harness = harness(Arc::new(Halve("render")))?;
        let payload = pdf_payload(2 * 1024 * 1024);
        let response =
            post_form(&harness.router, "/compress", &[("pdf", Some("big.pdf"), &payload)]).await?;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        Ok(())
    }

    #[tokio::test]
    async fn slow_requests_time_out() -> Result<(), Box<dyn Error>> {
        let harness = harness_with_timeout(Arc::new(Stall), Duration::from_millis(50))?;
        let payload = pdf_payload(512);
        let response =
            post_form(&harness.router, "/compress", &[("pdf", Some("a.pdf"), &payload)]).await?;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        Ok(())
    }

    #[tokio::test]
    async fn downloads_reject_traversal_and_missing_files() -> Result<(), Box<dyn Error>> {
        let harness = harness(Arc::new(Halve("render")))?;
        let response = get(&harness.router, "/download/..%2Fsecret.pdf").await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = get(&harness.router, "/download/.batch-1234").await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = get(&harness.router, "/download/absent.pdf").await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn word_conversion_honours_sort_flag() -> Result<(), Box<dyn Error>> {
        let harness = harness(Arc::new(Halve("render")))?;
        let payload = pdf_payload(1024);
        let response = post_form(
            &harness.router,
            "/convert-word",
            &[("pdf", Some("notes.pdf"), &payload), ("sort", None, b"false")],
        )
        .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body: ConvertResponse = json(response).await?;
        assert_eq!(body.title, "notes.pdf");
        assert!(body.download.ends_with("_notes.docx"));
        assert_eq!(
            harness.writer.sorts.lock().map_err(|_| "poisoned")?.as_slice(),
            [false]
        );

        let response = get(&harness.router, &body.download_url).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        assert_eq!(bytes.as_ref(), b"PK-docx");
        Ok(())
    }

    #[tokio::test]
    async fn word_conversion_requires_a_file() -> Result<(), Box<dyn Error>> {
        let harness = harness(Arc::new(Halve("render")))?;
        let response = post_form(&harness.router, "/convert-word", &[("sort", None, b"true")]).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let problem: ProblemDetails = json(response).await?;
        let params = problem.invalid_params.ok_or("missing invalid params")?;
        assert_eq!(params[0].pointer, "/pdf");
        Ok(())
    }
}
