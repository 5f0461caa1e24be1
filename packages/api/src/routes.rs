//! HTTP routes.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use pipeline::{ActorRef, JobService, Pipeline, StatisticsMessage};
use relay_core::{JobRecord, JobSpec, StatisticSnapshot};
use serde::Deserialize;

use crate::error::{ApiError, json_error};

/// Header carrying the caller's correlation id.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobService>,
    pub statistics: ActorRef<StatisticsMessage>,
}

impl AppState {
    pub fn from_pipeline(pipeline: &Pipeline) -> Self {
        Self {
            jobs: pipeline.jobs(),
            statistics: pipeline.statistics(),
        }
    }
}

/// Request body for creating a job.
#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub name: String,
    #[serde(default)]
    pub args: Option<Vec<String>>,
}

/// Build the HTTP router.
///
/// Unknown paths and unsupported methods answer 405.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/jobs", post(create_job).get(list_jobs))
        .route("/stats", get(stats))
        .fallback(method_not_allowed)
        .with_state(state)
}

async fn create_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<JobRecord>), ApiError> {
    if !is_json(&headers) {
        return Err(ApiError::UnsupportedContentType);
    }
    let request: CreateJobRequest = serde_json::from_slice(&body)?;
    let spec = JobSpec::new(request.name, request.args)?;

    let correlation_id = headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| ulid::Ulid::new().to_string());

    let record = state.jobs.create(spec, Some(correlation_id)).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_jobs(State(state): State<AppState>) -> Result<Json<Vec<JobRecord>>, ApiError> {
    Ok(Json(state.jobs.get_all().await?))
}

async fn stats(State(state): State<AppState>) -> Result<Json<StatisticSnapshot>, ApiError> {
    Ok(Json(pipeline::statistics::snapshot(&state.statistics).await?))
}

async fn method_not_allowed() -> Response {
    json_error(
        StatusCode::METHOD_NOT_ALLOWED,
        "method_not_allowed",
        "Method not allowed",
    )
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}
