//! HTTP server for the data model converter.
//!
//! # API Endpoints
//!
//! | Method | Path                  | Description                             |
//! |--------|-----------------------|-----------------------------------------|
//! | GET    | `/health`             | Health check                            |
//! | POST   | `/api/table-to-json`  | Upload CSV/XLSX, get the JSON model     |
//! | POST   | `/api/json-to-table`  | Post the JSON model, get an XLSX file   |
//! | POST   | `/api/validate-json`  | Validate a JSON model                   |
//! | POST   | `/api/validate-table` | Validate an uploaded CSV/XLSX           |
//! | GET    | `/api/logs`           | SSE stream for real-time logs           |
//!
//! `/api/json-to-table?format=csv` returns CSV instead of XLSX.

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Query},
    http::{header, Method},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{convert::Infallible, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use tracing::info;

use super::logs::LOG_BROADCASTER;
use super::types::MessageResponse;
use crate::config::ServerConfig;
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::parser::OutputFormat;
use crate::transform::pipeline::{
    check_model, check_table_bytes, convert_model, convert_table_bytes, ConvertOptions,
};

/// Name of the multipart field carrying the uploaded table.
const FILE_FIELD: &str = "file";

/// Download name of the generated table, without extension.
const TABLE_FILE_STEM: &str = "datamodel";

/// Build the application router.
pub fn app(config: &ServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/table-to-json", post(table_to_json))
        .route("/api/json-to-table", post(json_to_table))
        .route("/api/validate-json", post(validate_json))
        .route("/api/validate-table", post(validate_table))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
}

/// Start the HTTP server
pub async fn start_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.socket_addr();
    let app = app(&config);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, max_upload_bytes = config.max_upload_bytes, "data model server listening");
    info!("POST /api/table-to-json  - Upload CSV/XLSX, get JSON");
    info!("POST /api/json-to-table  - Post JSON, get XLSX (?format=csv for CSV)");
    info!("POST /api/validate-json  - Validate JSON");
    info!("POST /api/validate-table - Validate CSV/XLSX");
    info!("GET  /api/logs           - SSE log stream");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "cde-datamodel",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "tableToJson": "POST /api/table-to-json",
            "jsonToTable": "POST /api/json-to-table",
            "validateJson": "POST /api/validate-json",
            "validateTable": "POST /api/validate-table",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip the missed entries.
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Upload a table, get the JSON data model back (pretty-printed)
async fn table_to_json(
    multipart: Result<Multipart, MultipartRejection>,
) -> ServerResult<Response> {
    let upload = read_upload(multipart?).await?;
    info!(file = upload.name(), bytes = upload.bytes.len(), "table-to-json upload");

    let model = convert_table_bytes(
        &upload.bytes,
        upload.filename.as_deref(),
        &ConvertOptions::default(),
    )?;
    let body = serde_json::to_string_pretty(&model).map_err(PipelineError::from)?;

    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

#[derive(Debug, Default, Deserialize)]
struct TableQuery {
    #[serde(default)]
    format: OutputFormat,
}

/// Post a JSON data model, get the table back as a spreadsheet attachment
async fn json_to_table(
    Query(query): Query<TableQuery>,
    body: Bytes,
) -> ServerResult<Response> {
    let value = parse_json_body(&body)?;
    let table = convert_model(&value, &ConvertOptions::default())?;
    let bytes = table.encode(query.format).map_err(PipelineError::from)?;

    let disposition = format!(
        "attachment; filename=\"{TABLE_FILE_STEM}.{}\"",
        query.format.extension()
    );
    Ok((
        [
            (header::CONTENT_TYPE, query.format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Validate a JSON data model
async fn validate_json(body: Bytes) -> ServerResult<Json<MessageResponse>> {
    let value = parse_json_body(&body)?;
    check_model(&value)?;
    Ok(Json(MessageResponse::valid()))
}

/// Validate an uploaded table
async fn validate_table(
    multipart: Result<Multipart, MultipartRejection>,
) -> ServerResult<Json<MessageResponse>> {
    let upload = read_upload(multipart?).await?;
    info!(file = upload.name(), bytes = upload.bytes.len(), "validate-table upload");

    check_table_bytes(&upload.bytes, upload.filename.as_deref())?;
    Ok(Json(MessageResponse::valid()))
}

// =============================================================================
// Request helpers
// =============================================================================

impl From<MultipartRejection> for ServerError {
    fn from(rejection: MultipartRejection) -> Self {
        ServerError::BadRequest(format!("Multipart error: {}", rejection.body_text()))
    }
}

/// The `file` part of a multipart upload.
struct Upload {
    filename: Option<String>,
    bytes: Bytes,
}

impl Upload {
    fn name(&self) -> &str {
        self.filename.as_deref().unwrap_or("unknown")
    }
}

async fn read_upload(mut multipart: Multipart) -> ServerResult<Upload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Read error: {e}")))?;

        if filename.as_deref().unwrap_or("").is_empty() && bytes.is_empty() {
            return Err(ServerError::BadRequest("No selected file".into()));
        }
        return Ok(Upload { filename, bytes });
    }

    Err(ServerError::BadRequest("No file provided".into()))
}

fn parse_json_body(body: &[u8]) -> ServerResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ServerError::BadRequest("Please provide the json".into()));
    }
    Ok(serde_json::from_slice(body).map_err(PipelineError::from)?)
}
