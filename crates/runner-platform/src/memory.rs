use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::types::{JobCreateParams, JobCreateResponse, Platform, PlatformError};

/// In-process platform with a fixed project catalogue and a recording
/// scheduler. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryPlatform {
    inner: Arc<RwLock<Inner>>,
    next_job: Arc<AtomicU64>,
}

#[derive(Debug, Default)]
struct Inner {
    archives: HashMap<String, Vec<u8>>,
    jobs: Vec<JobCreateParams>,
    reject_jobs: Option<String>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_project(&self, project_id: &str, archive: Vec<u8>) {
        self.inner
            .write()
            .await
            .archives
            .insert(project_id.to_string(), archive);
    }

    /// Make every following job submission fail with `reason`.
    pub async fn reject_jobs(&self, reason: &str) {
        self.inner.write().await.reject_jobs = Some(reason.to_string());
    }

    pub async fn submitted_jobs(&self) -> Vec<JobCreateParams> {
        self.inner.read().await.jobs.clone()
    }
}

#[async_trait]
impl Platform for MemoryPlatform {
    async fn download_project(&self, project_id: &str, dest: &Path) -> Result<(), PlatformError> {
        let archive = {
            let inner = self.inner.read().await;
            inner
                .archives
                .get(project_id)
                .cloned()
                .ok_or_else(|| PlatformError::ProjectNotFound(project_id.to_string()))?
        };
        tokio::fs::write(dest, archive)
            .await
            .map_err(|source| PlatformError::Io {
                path: dest.to_path_buf(),
                source,
            })
    }

    async fn create_job(&self, params: &JobCreateParams) -> Result<JobCreateResponse, PlatformError> {
        let mut inner = self.inner.write().await;
        if let Some(reason) = inner.reject_jobs.as_ref() {
            return Err(PlatformError::Rejected(reason.clone()));
        }
        inner.jobs.push(params.clone());
        let n = self.next_job.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(JobCreateResponse {
            id: format!("job-{n}"),
            name: Some(params.name.clone()),
            state: Some("running".to_string()),
        })
    }
}
