//! Library ingestion routes.
//!
//! Scans run in the background and answer 202 right away; cleanup runs in
//! the request. Both answer 409 while another run holds the ingestion guard.

use std::path::PathBuf;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use nepenthe_common::Error;
use serde::{Deserialize, Serialize};

use super::{AppContext, AppError};
use crate::ingest::{CleanReport, IngestSummary};

pub fn library_routes() -> Router<AppContext> {
    Router::new()
        .route("/scan-library", post(scan_library))
        .route("/scan-library/cancel", post(cancel_scan))
        .route("/scan-status", get(scan_status))
        .route("/sync-and-clean", post(sync_and_clean))
}

/// Optional body of `POST /api/scan-library`.
#[derive(Debug, Default, Deserialize)]
pub struct ScanRequest {
    /// Roots to scan; the configured roots when absent or empty.
    #[serde(default)]
    pub paths: Option<Vec<PathBuf>>,
    /// Also retry stored records with missing fields.
    #[serde(default)]
    pub heal_existing: Option<bool>,
}

/// Body of `POST /api/sync-and-clean`.
#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    /// Every root that should remain in the library.
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct ScanStatus {
    pub running: bool,
    pub last: Option<IngestSummary>,
}

/// POST /api/scan-library
async fn scan_library(
    State(ctx): State<AppContext>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let request: ScanRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ScanRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| Error::invalid_input(format!("Invalid scan request: {e}")))?
    };

    let ticket = ctx
        .ingest
        .trigger_scan(request.paths, request.heal_existing)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "status": "scan_started",
            "roots": ticket.roots,
            "heal_existing": ticket.heal_existing,
        })),
    ))
}

/// POST /api/scan-library/cancel
async fn cancel_scan(State(ctx): State<AppContext>) -> Result<impl IntoResponse, AppError> {
    if !ctx.ingest.cancel() {
        return Err(Error::not_found("no scan in progress").into());
    }
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({"status": "cancelling"})),
    ))
}

/// GET /api/scan-status
async fn scan_status(State(ctx): State<AppContext>) -> Json<ScanStatus> {
    Json(ScanStatus {
        running: ctx.ingest.is_running(),
        last: ctx.ingest.last_summary(),
    })
}

/// POST /api/sync-and-clean
async fn sync_and_clean(
    State(ctx): State<AppContext>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<CleanReport>, AppError> {
    let report = ctx.ingest.sync_and_clean(request.paths).await?;
    Ok(Json(report))
}
