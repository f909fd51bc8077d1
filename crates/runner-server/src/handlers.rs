use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use runner_common::{ExecutionRequest, ExecutionResponse};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ExecuteError;
use crate::state::AppState;

pub async fn health_plain() -> Json<bool> {
    Json(true)
}

pub async fn execute(
    State(st): State<AppState>,
    payload: Result<Json<ExecutionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ExecutionResponse>), Response> {
    let Json(req) = payload.map_err(rejection_response)?;
    tracing::info!(project_id = %req.project_id, command = %req.command, "[POST] /api/v1/execute");
    let resp = st
        .orchestrator
        .execute(req)
        .await
        .map_err(ExecuteError::into_response)?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// Unreadable request bodies get the same error shape as execute failures.
/// No request id has been assigned at this point.
fn rejection_response(rejection: JsonRejection) -> Response {
    let status = rejection.status();
    let message = rejection.body_text();
    tracing::warn!(%status, error = %message, "execute body rejected");
    let body = json!({
        "error": {
            "message": message,
            "type": "invalid_request",
        }
    });
    (status, Json(body)).into_response()
}

pub fn router(st: AppState) -> Router {
    Router::new()
        .route("/health/plain", get(health_plain))
        .route("/api/v1/execute", post(execute))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(st)
}
