use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use runner_platform::JobCreateParams;
use serde_json::{json, Value};
use thiserror::Error;

/// Failures of one execute request. Every variant carries the request id so
/// the caller can correlate with server logs.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("invalid execute request: {reason}")]
    InvalidRequest { request_id: String, reason: String },

    #[error("Unable to locate project to execute")]
    ProjectNotFound {
        request_id: String,
        project_id: String,
        reason: String,
    },

    #[error("Unable to locate project to execute; removing {path} failed: {inner}")]
    CleanupFailed {
        request_id: String,
        path: PathBuf,
        inner: String,
    },

    #[error("{reason}")]
    InvalidArchive { request_id: String, reason: String },

    #[error("archive for project {project_id} contains no project directory")]
    MissingProjectRoot {
        request_id: String,
        project_id: String,
    },

    #[error("failed to stage project: {reason}")]
    Staging { request_id: String, reason: String },

    #[error("failed to write manifest {path}: {reason}")]
    ManifestWrite {
        request_id: String,
        path: PathBuf,
        reason: String,
    },

    #[error("Unable to determine app source for project: {reason}")]
    Configuration { request_id: String, reason: String },

    #[error("Unable to start job")]
    JobSubmission {
        request_id: String,
        params: JobCreateParams,
        reason: String,
    },
}

impl ExecuteError {
    pub fn request_id(&self) -> &str {
        match self {
            ExecuteError::InvalidRequest { request_id, .. }
            | ExecuteError::ProjectNotFound { request_id, .. }
            | ExecuteError::CleanupFailed { request_id, .. }
            | ExecuteError::InvalidArchive { request_id, .. }
            | ExecuteError::MissingProjectRoot { request_id, .. }
            | ExecuteError::Staging { request_id, .. }
            | ExecuteError::ManifestWrite { request_id, .. }
            | ExecuteError::Configuration { request_id, .. }
            | ExecuteError::JobSubmission { request_id, .. } => request_id,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ExecuteError::InvalidRequest { .. }
            | ExecuteError::ProjectNotFound { .. }
            | ExecuteError::InvalidArchive { .. }
            | ExecuteError::MissingProjectRoot { .. }
            | ExecuteError::JobSubmission { .. } => StatusCode::BAD_REQUEST,
            ExecuteError::CleanupFailed { .. }
            | ExecuteError::Staging { .. }
            | ExecuteError::ManifestWrite { .. }
            | ExecuteError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ExecuteError::InvalidRequest { .. } => "invalid_request",
            ExecuteError::ProjectNotFound { .. } => "project_not_found",
            ExecuteError::CleanupFailed { .. } => "cleanup_failed",
            ExecuteError::InvalidArchive { .. } => "invalid_archive",
            ExecuteError::MissingProjectRoot { .. } => "missing_project_root",
            ExecuteError::Staging { .. } => "staging_failed",
            ExecuteError::ManifestWrite { .. } => "manifest_write_failed",
            ExecuteError::Configuration { .. } => "configuration",
            ExecuteError::JobSubmission { .. } => "job_submission_failed",
        }
    }

    pub fn body(&self) -> Value {
        let mut error = json!({
            "message": self.to_string(),
            "type": self.kind(),
            "request_id": self.request_id(),
        });
        match self {
            ExecuteError::CleanupFailed { inner, .. } => {
                error["inner_error"] = json!(inner);
            }
            ExecuteError::JobSubmission { params, .. } => {
                error["params"] = json!(params);
            }
            _ => {}
        }
        json!({ "error": error })
    }
}

impl IntoResponse for ExecuteError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(request_id = %self.request_id(), error = %self, "execute failed");
        } else {
            tracing::warn!(request_id = %self.request_id(), error = %self, "execute rejected");
        }
        (status, Json(self.body())).into_response()
    }
}
