// crates/server/src/routes/jobs.rs
//! Job queue endpoints: enqueue, run, inspect, purge.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use rolo_db::{now_ms, Job, JobKind, NewJob};
use rolo_jobs::{comprehensive_status, ComprehensiveStatus, RunSummary, StatusOptions};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_PURGE_DAYS: i64 = 30;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", post(enqueue_job))
        .route("/jobs/run", post(run_jobs))
        .route("/jobs/status", get(job_status))
        .route("/jobs/purge", delete(purge_jobs))
        .route("/jobs/{id}", get(get_job))
}

/// Resolve the caller's user id from the `x-user-id` header.
///
/// Every job row is scoped to a user, so an absent or empty header is a
/// client error, not an anonymous default.
fn require_user(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(ApiError::MissingUser)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnqueueRequest {
    kind: JobKind,
    #[serde(default)]
    payload: Option<serde_json::Value>,
    #[serde(default)]
    batch_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnqueueResponse {
    job_id: String,
}

async fn enqueue_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<EnqueueRequest>,
) -> ApiResult<Json<EnqueueResponse>> {
    let user_id = require_user(&headers)?;
    let job_id = state
        .db
        .enqueue_job(NewJob {
            user_id: &user_id,
            kind: req.kind,
            payload: req.payload.unwrap_or_else(|| serde_json::json!({})),
            batch_id: req.batch_id.as_deref(),
        })
        .await?;
    Ok(Json(EnqueueResponse { job_id }))
}

async fn run_jobs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<RunSummary>> {
    let user_id = require_user(&headers)?;
    let summary = state.runner.run_pending(&user_id).await?;
    Ok(Json(summary))
}

async fn job_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(opts): Query<StatusOptions>,
) -> ApiResult<Json<ComprehensiveStatus>> {
    let user_id = require_user(&headers)?;
    let status = comprehensive_status(&state.db, &user_id, &opts, &state.status_config).await;
    Ok(Json(status))
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    let user_id = require_user(&headers)?;
    let job = state
        .db
        .get_job(&user_id, &id)
        .await?
        .ok_or_else(|| ApiError::JobNotFound(id))?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PurgeQuery {
    older_than_days: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PurgeResponse {
    purged: u64,
}

async fn purge_jobs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<PurgeQuery>,
) -> ApiResult<Json<PurgeResponse>> {
    let user_id = require_user(&headers)?;
    let days = query.older_than_days.unwrap_or(DEFAULT_PURGE_DAYS);
    if days <= 0 {
        return Err(ApiError::BadRequest(
            "olderThanDays must be positive".to_string(),
        ));
    }
    let cutoff = now_ms() - days * 24 * 60 * 60 * 1000;
    let purged = state.db.purge_finished_jobs(&user_id, cutoff).await?;
    Ok(Json(PurgeResponse { purged }))
}
