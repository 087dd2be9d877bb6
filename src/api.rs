//! HTTP surface over [`JobService`].
//!
//! `POST /jobs` creates a job, `GET /jobs/{id}` reads its status and
//! `GET /queue` returns the health snapshot. Routes also answer with a
//! trailing slash.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::IngestError;
use crate::queue::HealthSnapshot;
use crate::service::{ExecutionMode, JobService, JobView};

#[derive(Debug, Serialize)]
struct Created {
    id: Uuid,
}

/// Error body sent to clients. Internal faults are logged, never echoed.
struct ApiError(IngestError);

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            IngestError::JobNotFound(_) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": "Job not found" }))).into_response()
            }
            other => {
                error!(error = %other, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}

pub fn router(service: Arc<JobService>) -> Router {
    Router::new()
        .route("/jobs", post(create_job))
        .route("/jobs/", post(create_job))
        .route("/jobs/{id}", get(job_status))
        .route("/jobs/{id}/", get(job_status))
        .route("/queue", get(queue_status))
        .route("/queue/", get(queue_status))
        .with_state(service)
}

pub async fn serve(service: Arc<JobService>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP API listening");
    axum::serve(listener, router(service))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}

async fn create_job(
    State(service): State<Arc<JobService>>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    let job = service.submit(ExecutionMode::Queued).await?;
    Ok((StatusCode::CREATED, Json(Created { id: job.id })))
}

async fn job_status(
    State(service): State<Arc<JobService>>,
    Path(raw_id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
    // Malformed ids can never name a job, so they are reported like unknown ones.
    let id = Uuid::parse_str(&raw_id).map_err(|_| IngestError::JobNotFound(Uuid::nil()))?;
    Ok(Json(service.status(id).await?))
}

async fn queue_status(State(service): State<Arc<JobService>>) -> Json<HealthSnapshot> {
    Json(service.health().await)
}
