use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use runner_common::{ConfigError, ExecutionRequest, ExecutionResponse, Manifest, MANIFEST_PATH_VAR};
use runner_platform::{JobCreateParams, Platform};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::archive::{self, ArchiveError};
use crate::error::ExecuteError;

/// Variable names whose values are masked when job parameters are echoed
/// back to a caller.
const SENSITIVE_MARKERS: [&str; 5] = ["TOKEN", "SECRET", "PASSWORD", "KEY", "CREDENTIAL"];
const REDACTED: &str = "<redacted>";
const APP_SOURCE_VAR: &str = "APP_SOURCE";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Parent of every per-request staging directory.
    pub storage_root: PathBuf,
    /// Deployment location of this service, e.g.
    /// `http://storage/projects/<project>/archive/<version>`.
    pub app_source: Option<String>,
    /// Project command the scheduler runs to start a worker.
    pub worker_command: String,
}

/// Stages a project and hands it to the scheduler:
/// download → validate → extract → manifest → job.
///
/// Requests never share state beyond the platform client; each one works
/// inside its own `<storage_root>/<request_id>` directory.
pub struct Orchestrator {
    platform: Arc<dyn Platform>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(platform: Arc<dyn Platform>, config: OrchestratorConfig) -> Self {
        Self { platform, config }
    }

    pub fn cache_path(&self, request_id: &str) -> PathBuf {
        self.config.storage_root.join(request_id)
    }

    pub async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResponse, ExecuteError> {
        let request_id = Uuid::new_v4().to_string();
        let cache = self.cache_path(&request_id);
        info!(
            request_id = %request_id,
            project_id = %request.project_id,
            cache = %cache.display(),
            "execute request accepted"
        );

        validate_project_id(&request.project_id).map_err(|reason| ExecuteError::InvalidRequest {
            request_id: request_id.clone(),
            reason,
        })?;

        let archive_path = self.download_project(&request, &request_id, &cache).await?;
        let project_path = stage_project(&request, &request_id, &archive_path, &cache).await?;
        let manifest_path = write_manifest(&request, &request_id, &project_path, &cache).await?;

        let ident = job_ident(self.config.app_source.as_deref()).map_err(|e| {
            ExecuteError::Configuration {
                request_id: request_id.clone(),
                reason: e.to_string(),
            }
        })?;

        let params = JobCreateParams {
            name: request_id.clone(),
            ident,
            command: self.config.worker_command.clone(),
            variables: job_variables(&request.variables, &manifest_path),
            run: true,
        };

        let job = match self.platform.create_job(&params).await {
            Ok(job) => job,
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "job submission failed");
                return Err(ExecuteError::JobSubmission {
                    request_id,
                    params: redact(&params),
                    reason: e.to_string(),
                });
            }
        };

        info!(request_id = %request_id, job_id = %job.id, "job submitted");
        Ok(ExecutionResponse {
            request_id,
            job_id: Some(job.id),
        })
    }

    async fn download_project(
        &self,
        request: &ExecutionRequest,
        request_id: &str,
        cache: &Path,
    ) -> Result<PathBuf, ExecuteError> {
        tokio::fs::create_dir_all(cache)
            .await
            .map_err(|e| ExecuteError::Staging {
                request_id: request_id.to_string(),
                reason: format!("cannot create {}: {e}", cache.display()),
            })?;

        let archive_path = cache.join(format!("{}.tar.gz", request.project_id));
        let Err(e) = self
            .platform
            .download_project(&request.project_id, &archive_path)
            .await
        else {
            return Ok(archive_path);
        };

        warn!(request_id, project_id = %request.project_id, error = %e, "project download failed");
        if let Err(inner) = tokio::fs::remove_dir_all(cache).await {
            error!(request_id, cache = %cache.display(), error = %inner, "cache cleanup failed");
            return Err(ExecuteError::CleanupFailed {
                request_id: request_id.to_string(),
                path: cache.to_path_buf(),
                inner: inner.to_string(),
            });
        }
        Err(ExecuteError::ProjectNotFound {
            request_id: request_id.to_string(),
            project_id: request.project_id.clone(),
            reason: e.to_string(),
        })
    }
}

/// Extract the archive and resolve the project root, off the async runtime.
async fn stage_project(
    request: &ExecutionRequest,
    request_id: &str,
    archive_path: &Path,
    cache: &Path,
) -> Result<PathBuf, ExecuteError> {
    let archive_path = archive_path.to_path_buf();
    let cache = cache.to_path_buf();
    let staged = tokio::task::spawn_blocking(move || {
        archive::expand(&archive_path, &cache)?;
        find_project_root(&cache).map_err(|source| ArchiveError::Extract {
            path: cache.clone(),
            source,
        })
    })
    .await
    .map_err(|e| ExecuteError::Staging {
        request_id: request_id.to_string(),
        reason: e.to_string(),
    })?;

    match staged {
        Ok(Some(root)) => {
            info!(request_id, project_path = %root.display(), "project staged");
            Ok(root)
        }
        Ok(None) => Err(ExecuteError::MissingProjectRoot {
            request_id: request_id.to_string(),
            project_id: request.project_id.clone(),
        }),
        Err(e @ ArchiveError::NotAnArchive(_)) => Err(ExecuteError::InvalidArchive {
            request_id: request_id.to_string(),
            reason: e.to_string(),
        }),
        Err(e) => Err(ExecuteError::Staging {
            request_id: request_id.to_string(),
            reason: e.to_string(),
        }),
    }
}

async fn write_manifest(
    request: &ExecutionRequest,
    request_id: &str,
    project_path: &Path,
    cache: &Path,
) -> Result<PathBuf, ExecuteError> {
    let path = Manifest::path_in(cache);
    let manifest = Manifest {
        request_id: request_id.to_string(),
        project_path: project_path.to_string_lossy().into_owned(),
        request: request.clone(),
    };
    let write_err = |reason: String| ExecuteError::ManifestWrite {
        request_id: request_id.to_string(),
        path: path.clone(),
        reason,
    };

    let bytes = manifest.to_json_vec().map_err(|e| write_err(e.to_string()))?;
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| write_err(e.to_string()))?;
    Ok(path)
}

/// First directory directly under `cache`, by name.
///
/// An archive is expected to hold exactly one top-level directory. When it
/// holds several the choice is still deterministic but almost certainly not
/// what the caller meant, so it is logged.
pub fn find_project_root(cache: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(cache)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    if dirs.len() > 1 {
        warn!(
            cache = %cache.display(),
            candidates = dirs.len(),
            "archive has several top-level directories, using the first by name"
        );
    }
    Ok(dirs.into_iter().next())
}

fn validate_project_id(project_id: &str) -> Result<(), String> {
    if project_id.trim().is_empty() {
        return Err("project_id must not be empty".to_string());
    }
    if project_id.contains(['/', '\\']) || project_id.contains("..") {
        return Err(format!("project_id {project_id:?} is not a plain identifier"));
    }
    Ok(())
}

/// Request variables plus the manifest location. The manifest entry always
/// wins over a caller-supplied variable of the same name.
pub fn job_variables(
    variables: &BTreeMap<String, String>,
    manifest_path: &Path,
) -> BTreeMap<String, String> {
    let mut out = variables.clone();
    let manifest = manifest_path.to_string_lossy().into_owned();
    if let Some(previous) = out.insert(MANIFEST_PATH_VAR.to_string(), manifest) {
        warn!(previous = %previous, "request variable {MANIFEST_PATH_VAR} overridden");
    }
    out
}

/// Scheduler identity of the deployed application, from a source location of
/// the form `<scheme>://<host>/projects/<id>/...`.
pub fn job_ident(app_source: Option<&str>) -> Result<String, ConfigError> {
    let source = app_source
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVar(APP_SOURCE_VAR.to_string()))?;
    let project = source
        .split('/')
        .nth(4)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::InvalidVar {
            name: APP_SOURCE_VAR.to_string(),
            reason: format!("{source:?} has no project segment"),
        })?;
    Ok(format!("a0-{project}"))
}

pub fn redact(params: &JobCreateParams) -> JobCreateParams {
    let variables = params
        .variables
        .iter()
        .map(|(k, v)| {
            let upper = k.to_ascii_uppercase();
            if SENSITIVE_MARKERS.iter().any(|m| upper.contains(m)) {
                (k.clone(), REDACTED.to_string())
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect();
    JobCreateParams {
        variables,
        ..params.clone()
    }
}
