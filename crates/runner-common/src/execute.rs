use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What to run and how. Posted by callers to `/api/v1/execute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Platform identifier of the project whose archive is staged.
    pub project_id: String,

    /// Command line run inside the extracted project directory.
    pub command: String,

    /// Extra environment handed to the job.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl ExecutionRequest {
    pub fn new(
        project_id: impl Into<String>,
        command: impl Into<String>,
        variables: BTreeMap<String, String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            command: command.into(),
            variables,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResponse {
    pub request_id: String,
    #[serde(default)]
    pub job_id: Option<String>,
}
