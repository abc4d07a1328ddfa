//! HTTP Server for the opportunity report API.
//!
//! Provides REST endpoints for spreadsheet upload, report building and CSV
//! export. The pipeline runs on a blocking worker thread per request.
//!
//! # API Endpoints
//!
//! | Method | Path                  | Description                        |
//! |--------|-----------------------|------------------------------------|
//! | GET    | `/health`             | Health check                       |
//! | POST   | `/api/report`         | Upload spreadsheet, get the report |
//! | POST   | `/api/export/counts`  | Upload spreadsheet, get counts CSV |
//! | POST   | `/api/export/values`  | Upload spreadsheet, get values CSV |
//! | GET    | `/api/logs`           | SSE stream for real-time logs      |

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, log_success, Stage, LOG_BROADCASTER};
use super::types::{error_response, ReportResponse};
use crate::config::ReportConfig;
use crate::error::{ReportError, ServerError, ServerResult};
use crate::export::{counts_csv, values_csv, COUNTS_FILE_NAME, VALUES_FILE_NAME};
use crate::transform::pipeline::{build_report, Report};

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

type ApiError = (StatusCode, Json<Value>);

#[derive(Clone)]
struct AppState {
    config: Arc<ReportConfig>,
}

/// Start the HTTP server
pub async fn start_server(port: u16, config: ReportConfig) -> Result<(), Box<dyn std::error::Error>> {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let app = router(config).layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Opportunity report server running on http://localhost:{}", port);
    println!("   POST /api/report         - Upload spreadsheet, get report");
    println!("   POST /api/export/counts  - Upload spreadsheet, get {}", COUNTS_FILE_NAME);
    println!("   POST /api/export/values  - Upload spreadsheet, get {}", VALUES_FILE_NAME);
    println!("   GET  /api/logs           - SSE log stream");
    println!("   GET  /health             - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(config: ReportConfig) -> Router {
    let state = AppState {
        config: Arc::new(config),
    };

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/report", post(upload_report))
        .route("/api/export/counts", post(export_counts))
        .route("/api/export/values", post(export_values))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "oppreport",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "report": "POST /api/report",
            "exportCounts": "POST /api/export/counts",
            "exportValues": "POST /api/export/values",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        // Lagged receivers skip what they missed.
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Upload endpoint returning the full report
async fn upload_report(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ReportResponse>, ApiError> {
    let report = report_from_upload(&state, multipart).await.map_err(reply_error)?;
    let response = ReportResponse::from_report(report)
        .map_err(|e| reply_error(ReportError::from(e).into()))?;
    Ok(Json(response))
}

async fn export_counts(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let report = report_from_upload(&state, multipart).await.map_err(reply_error)?;
    let content = counts_csv(&report).map_err(|e| reply_error(ReportError::from(e).into()))?;
    Ok(csv_attachment(COUNTS_FILE_NAME, content))
}

async fn export_values(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let report = report_from_upload(&state, multipart).await.map_err(reply_error)?;
    let content = values_csv(&report).map_err(|e| reply_error(ReportError::from(e).into()))?;
    Ok(csv_attachment(VALUES_FILE_NAME, content))
}

fn csv_attachment(file_name: &str, content: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        content,
    )
}

/// Read the `file` field and run the pipeline on a blocking thread.
async fn report_from_upload(state: &AppState, mut multipart: Multipart) -> ServerResult<Report> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().map(|s| s.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
            file_data = Some(bytes.to_vec());
        }
    }

    let bytes = file_data.ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?;

    log_info(
        Stage::Server,
        format!(
            "New upload: {} ({} bytes)",
            file_name.as_deref().unwrap_or("unknown"),
            bytes.len()
        ),
    );

    let config = Arc::clone(&state.config);
    let report = tokio::task::spawn_blocking(move || build_report(&bytes, &config))
        .await
        .map_err(|e| ServerError::Internal(format!("Report task failed: {}", e)))??;

    log_success(
        Stage::Server,
        format!(
            "Report ready: {} records, {} skipped row issue(s)",
            report.record_count,
            report.skipped_rows.len()
        ),
    );
    Ok(report)
}

fn status_for(err: &ServerError) -> StatusCode {
    match err {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Report(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
        ServerError::Report(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reply_error(err: ServerError) -> ApiError {
    log_error(Stage::Server, err.to_string());
    (status_for(&err), Json(error_response(&err.to_string())))
}
