//! HTTP server.
//!
//! Endpoints:
//! - POST /process_pdf - Upload a PDF, get a CSV back
//! - GET / - Upload form
//! - POST / - Upload form submission
//! - GET /health - Liveness check

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use tokio::signal;
use tower_http::trace::TraceLayer;

use crate::{
    csv_output::csv_output_path,
    ocr::DocumentAnalyzer,
    pipeline::{self, PipelineError},
    prelude::*,
    summary::PageSummaryRow,
    upload::Upload,
};

pub mod api;
pub mod form;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    analyzer: Arc<dyn DocumentAnalyzer>,
    scratch_dir: Option<PathBuf>,
}

impl AppState {
    /// Create our state. Request directories go under `scratch_dir`, or the
    /// system temporary directory if it's `None`.
    pub fn new(analyzer: Arc<dyn DocumentAnalyzer>, scratch_dir: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                analyzer,
                scratch_dir,
            }),
        }
    }

    /// The document analyzer.
    pub fn analyzer(&self) -> &dyn DocumentAnalyzer {
        self.inner.analyzer.as_ref()
    }

    /// Where request directories are created.
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.inner.scratch_dir.as_deref()
    }
}

/// Build our router.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(api::router())
        .merge(form::router())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// The fields of an upload request.
#[derive(Debug)]
pub struct UploadForm {
    /// The client's name for the file.
    pub file_name: Option<String>,

    /// The file contents.
    pub bytes: Bytes,

    /// The raw page range, if the field was sent.
    pub page_range: Option<String>,
}

impl UploadForm {
    /// Read `file` and `page_range` from a multipart body. Other fields are
    /// ignored.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, PipelineError> {
        let mut file = None;
        let mut page_range = None;
        while let Some(field) = multipart.next_field().await.map_err(|e| {
            PipelineError::BadRequest(format!("failed to read multipart field: {e}"))
        })? {
            let name = field.name().unwrap_or_default().to_owned();
            match name.as_str() {
                "file" => {
                    let file_name = field.file_name().map(str::to_owned);
                    let bytes = field.bytes().await.map_err(|e| {
                        PipelineError::BadRequest(format!("failed to read file data: {e}"))
                    })?;
                    file = Some((file_name, bytes));
                }
                "page_range" => {
                    let text = field.text().await.map_err(|e| {
                        PipelineError::BadRequest(format!("failed to read page_range: {e}"))
                    })?;
                    page_range = Some(text);
                }
                _ => debug!(field = %name, "Ignoring unexpected multipart field"),
            }
        }

        let (file_name, bytes) = file.ok_or_else(|| {
            PipelineError::BadRequest("missing `file` field".to_owned())
        })?;
        Ok(Self {
            file_name,
            bytes,
            page_range,
        })
    }
}

/// A finished upload, held in memory so the request directory can go away.
#[derive(Debug)]
pub struct ProcessedUpload {
    /// File name for the download, e.g. `doc.csv`.
    pub csv_file_name: String,

    /// The CSV bytes.
    pub csv: Vec<u8>,

    /// The rows in the CSV.
    pub rows: Vec<PageSummaryRow>,
}

/// Run an upload through the pipeline.
///
/// The upload and its CSV are deleted before we return, on success or
/// failure.
#[instrument(
    level = "info",
    skip_all,
    fields(request_id = %uuid::Uuid::new_v4(), file_name = ?form.file_name)
)]
pub async fn process_upload(
    state: &AppState,
    form: UploadForm,
) -> Result<ProcessedUpload, PipelineError> {
    let upload = Upload::receive(
        state.scratch_dir(),
        form.file_name.as_deref(),
        &form.bytes,
        form.page_range.as_deref(),
    )
    .await
    .map_err(PipelineError::Upload)?;

    let csv_path = csv_output_path(upload.path(), Some(upload.dir()));
    let output =
        pipeline::run(state.analyzer(), upload.path(), upload.page_range(), &csv_path)
            .await?;

    let csv = tokio::fs::read(&output.csv_path)
        .await
        .with_context(|| format!("Failed to read back {:?}", output.csv_path))
        .map_err(PipelineError::CsvWrite)?;
    let csv_file_name = output
        .csv_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.csv".to_owned());
    Ok(ProcessedUpload {
        csv_file_name,
        csv,
        rows: output.rows,
    })
}

impl PipelineError {
    /// The HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::BadRequest(_) => StatusCode::BAD_REQUEST,
            PipelineError::NoExtractableContent => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::Analysis(_) => StatusCode::BAD_GATEWAY,
            PipelineError::Upload(_) | PipelineError::Input(_) | PipelineError::CsvWrite(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// A stable, machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::BadRequest(_) => "BAD_REQUEST",
            PipelineError::Upload(_) => "UPLOAD_FAILED",
            PipelineError::Input(_) => "INPUT_READ_FAILED",
            PipelineError::Analysis(_) => "ANALYSIS_FAILED",
            PipelineError::NoExtractableContent => "NO_EXTRACTABLE_CONTENT",
            PipelineError::CsvWrite(_) => "CSV_WRITE_FAILED",
        }
    }

    /// Log this error at a level matching its status.
    fn log(&self) {
        if self.status_code().is_server_error() {
            error!(code = self.code(), "{self}");
        } else {
            warn!(code = self.code(), "{self}");
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        self.log();
        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code(),
        });
        (self.status_code(), body).into_response()
    }
}

/// Wait for Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use axum::{
        body::Body,
        http::{Request, header::CONTENT_TYPE},
    };
    use tower::ServiceExt as _;

    use super::*;
    use crate::pipeline::tests::FakeAnalyzer;

    const BOUNDARY: &str = "pdf-ocr-csv-test-boundary";

    /// Build a multipart POST with optional `file` and `page_range` fields.
    pub(crate) fn multipart_request(
        uri: &str,
        file: Option<(&str, &[u8])>,
        page_range: Option<&str>,
    ) -> Request<Body> {
        let mut body = Vec::new();
        if let Some((file_name, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        if let Some(range) = page_range {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"page_range\"\r\n\r\n{range}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    /// A router backed by `analyzer`.
    pub(crate) fn test_router(analyzer: Arc<FakeAnalyzer>) -> Router {
        router(AppState::new(analyzer, None), 1024 * 1024)
    }

    pub(crate) async fn body_bytes(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn health_check_works() {
        let app = test_router(Arc::new(FakeAnalyzer::with_one_page()));
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn process_upload_cleans_up_after_itself() {
        let analyzer = Arc::new(FakeAnalyzer::with_one_page());
        let root = tempfile::tempdir().unwrap();
        let state = AppState::new(analyzer.clone(), Some(root.path().to_owned()));
        let form = UploadForm {
            file_name: Some("doc.pdf".to_owned()),
            bytes: Bytes::from_static(b"%PDF"),
            page_range: Some("".to_owned()),
        };

        let processed = process_upload(&state, form).await.unwrap();

        assert_eq!(processed.csv_file_name, "doc.csv");
        assert_eq!(processed.rows.len(), 1);
        let (path, page_range) = analyzer.calls.lock().unwrap()[0].clone();
        assert_eq!(path.file_name().unwrap(), "doc.pdf");
        assert_eq!(page_range, None);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn process_upload_cleans_up_after_failure() {
        let root = tempfile::tempdir().unwrap();
        let state = AppState::new(
            Arc::new(FakeAnalyzer::with_blank_pages()),
            Some(root.path().to_owned()),
        );
        let form = UploadForm {
            file_name: Some("blank.pdf".to_owned()),
            bytes: Bytes::from_static(b"%PDF"),
            page_range: None,
        };

        let err = process_upload(&state, form).await.unwrap_err();

        assert!(matches!(err, PipelineError::NoExtractableContent));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn error_statuses() {
        assert_eq!(
            PipelineError::NoExtractableContent.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            PipelineError::Analysis(anyhow!("quota exceeded")).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            PipelineError::Input(anyhow!("permission denied")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            PipelineError::BadRequest("nope".to_owned()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
