//! HTTP request handlers

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    response::IntoResponse,
    Json,
};
use futures::stream::Stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::errors::LandfallError;
use crate::models::config::{DeployConfig, Target};
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "landfall".to_string(),
        version: version.version,
    })
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Error body for every non-2xx response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(err: LandfallError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        LandfallError::NotFound(_) => StatusCode::NOT_FOUND,
        LandfallError::UnknownTarget(_) | LandfallError::ConfigError(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// Deployment start request
#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub target: String,
    pub config: DeployConfig,
}

/// Deployment start / retry response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub operation_id: Uuid,
}

/// Start a deployment. Returns 202 immediately; the caller polls or
/// subscribes for progress.
pub async fn start_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<StartRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let target: Target = request.target.parse().map_err(error_response)?;
    let op = state
        .orchestrator
        .start(target, request.config)
        .await
        .map_err(error_response)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(StartResponse {
            operation_id: op.id(),
        }),
    ))
}

/// Status poll. 200 even when the workload itself failed; the operation
/// completed its lifecycle either way.
pub async fn status_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let op = state.orchestrator.get(id).await.map_err(error_response)?;
    Ok(Json(op.snapshot().await))
}

/// Cancel response
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub status: String,
}

/// Cancel handler. Idempotent; cancelling a finished operation is a no-op.
pub async fn cancel_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    state.orchestrator.cancel(id).await.map_err(error_response)?;
    Ok(Json(CancelResponse {
        status: "cancelled".to_string(),
    }))
}

/// Retry handler: relaunches the plan under a fresh operation id.
pub async fn retry_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let op = state.orchestrator.retry(id).await.map_err(error_response)?;
    Ok(Json(StartResponse {
        operation_id: op.id(),
    }))
}

/// Live event stream. One SSE record per event; the stream ends after the
/// terminal `complete`/`error` event because the operation closes every
/// observer channel.
pub async fn events_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, (StatusCode, Json<ErrorResponse>)>
{
    let (_observer_id, rx) = state
        .orchestrator
        .subscribe(id)
        .await
        .map_err(error_response)?;

    let stream = ReceiverStream::new(rx).map(|event| {
        let kind = event.kind();
        let payload = serde_json::to_value(&event)
            .ok()
            .and_then(|v| v.get("data").cloned())
            .unwrap_or(serde_json::Value::Null);
        Ok(SseEvent::default().event(kind).data(payload.to_string()))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
