use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use runner_sdk::DispatchError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("project {0} not found")]
    ProjectNotFound(String),

    #[error("scheduler rejected job: {0}")]
    Rejected(String),

    #[error("scheduler returned an unexpected body: {0}")]
    Decode(String),
}

/// Parameters of a scheduler job creation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCreateParams {
    pub name: String,
    pub ident: String,
    pub command: String,
    pub variables: BTreeMap<String, String>,
    pub run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCreateResponse {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// The remote platform: archive storage plus job scheduler.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Fetch the archive of `project_id` and store it at `dest`.
    async fn download_project(&self, project_id: &str, dest: &Path) -> Result<(), PlatformError>;

    /// Create (and optionally start) a job, returning the scheduler's record.
    async fn create_job(&self, params: &JobCreateParams) -> Result<JobCreateResponse, PlatformError>;
}
