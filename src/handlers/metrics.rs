use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::metrics::{ReservoirKind, SnapshotReport};
use crate::AppState;

use super::AppError;

// ─── Request / response types ────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct RecordRequest {
    pub value: i64,

    /// Label kept with the value if it becomes the min or max
    #[serde(default)]
    pub user_value: Option<String>,

    /// Reservoir to create the metric with if it does not exist yet
    #[serde(default)]
    pub kind: Option<ReservoirKind>,
}

#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub name: String,
    pub kind: ReservoirKind,
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuantileQuery {
    pub q: f64,
}

#[derive(Debug, Serialize)]
pub struct QuantileValue {
    pub name: String,
    pub quantile: f64,
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct ResetStatus {
    pub reset: usize,
}

// ─── GET /api/metrics/:name ──────────────────────────────────────

pub async fn get_metric(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<SnapshotReport>, AppError> {
    state
        .metrics
        .report_for(&name)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Metric {name} not found")))
}

// ─── GET /api/metrics/:name/quantile?q= ──────────────────────────

pub async fn get_quantile(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<QuantileQuery>,
) -> Result<Json<QuantileValue>, AppError> {
    let reservoir = state
        .metrics
        .get(&name)
        .ok_or_else(|| AppError::NotFound(format!("Metric {name} not found")))?;

    let value = reservoir.snapshot().value(query.q)?;

    Ok(Json(QuantileValue {
        name,
        quantile: query.q,
        value,
    }))
}

// ─── POST /api/metrics/:name ─────────────────────────────────────

pub async fn record_value(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<RecordRequest>,
) -> Result<Json<RecordResponse>, AppError> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("metric name must not be empty".into()));
    }

    let kind = req.kind.unwrap_or_else(|| state.metrics.default_kind());
    let reservoir = state.metrics.histogram(&name, kind)?;
    reservoir.update(req.value, req.user_value.as_deref())?;

    Ok(Json(RecordResponse {
        name,
        kind: reservoir.kind(),
        count: reservoir.count(),
    }))
}

// ─── POST /api/metrics/reset ─────────────────────────────────────

pub async fn reset_metrics(State(state): State<Arc<AppState>>) -> Json<ResetStatus> {
    state.metrics.reset_all();
    Json(ResetStatus {
        reset: state.metrics.names().len(),
    })
}
