//! HTTP request handlers

use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::detection::{summarize_anomalies, ScoredLine, MAX_ANOMALIES, SAMPLE_SIZE};

use super::error::{Result, ServerError};
use super::state::AppState;

const MISSING_LOGS: &str = "Request body must be JSON with a 'logs' key";
const LOGS_NOT_STRINGS: &str = "'logs' must be an array of strings";

/// Successful detection payload
#[derive(Debug, Serialize, Deserialize)]
pub struct DetectResponse {
    pub anomalies: Vec<String>,
}

/// Detection payload with scores and a condensed view
#[derive(Debug, Serialize, Deserialize)]
pub struct ReportResponse {
    pub total_lines: usize,
    pub anomaly_count: usize,
    pub threshold: f64,
    pub anomalies: Vec<ScoredLine>,
    pub summary: Vec<String>,
}

/// Pull the `logs` array out of a request body.
///
/// A null `logs` value reads as an empty batch; anything that is not an
/// object with a `logs` key, or a `logs` that is not a list of strings, is
/// rejected before the detector is ever called.
pub fn parse_logs(body: &[u8]) -> Result<Vec<String>> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|_| ServerError::BadRequest(MISSING_LOGS.to_string()))?;

    let logs = value
        .as_object()
        .and_then(|obj| obj.get("logs"))
        .ok_or_else(|| ServerError::BadRequest(MISSING_LOGS.to_string()))?;

    match logs {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ServerError::BadRequest(LOGS_NOT_STRINGS.to_string()))
            })
            .collect(),
        _ => Err(ServerError::BadRequest(LOGS_NOT_STRINGS.to_string())),
    }
}

// ============================================================================
// Detection Handlers
// ============================================================================

/// Return the anomalous subset of the submitted log lines
pub async fn detect(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<DetectResponse>> {
    let lines = parse_logs(&body)?;
    if lines.is_empty() {
        debug!("Empty log batch received");
        state.record_request(0);
        return Ok(Json(DetectResponse { anomalies: Vec::new() }));
    }

    let n_lines = lines.len();
    let service = state.detector.clone();
    // Fitting is CPU-bound
    let anomalies = tokio::task::spawn_blocking(move || service.detect(&lines))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;

    info!(n_lines, n_anomalies = anomalies.len(), "Detect request served");
    state.record_request(anomalies.len());

    Ok(Json(DetectResponse { anomalies }))
}

/// Return scored anomalies plus a summary suitable for prompts and dashboards
pub async fn detect_report(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ReportResponse>> {
    let lines = parse_logs(&body)?;

    let service = state.detector.clone();
    let report = tokio::task::spawn_blocking(move || service.detect_with_scores(&lines))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;

    let summary = summarize_anomalies(&report.lines(), MAX_ANOMALIES, SAMPLE_SIZE);
    state.record_request(report.anomaly_count);

    Ok(Json(ReportResponse {
        total_lines: report.total_lines,
        anomaly_count: report.anomaly_count,
        threshold: report.threshold,
        anomalies: report.anomalies,
        summary,
    }))
}

// ============================================================================
// System Handlers
// ============================================================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.uptime_secs(),
        "requests_served": state.requests_served(),
        "anomalies_reported": state.anomalies_reported(),
        "max_body_size": state.config.max_body_size,
        "detector": state.detector.config(),
    }))
}
