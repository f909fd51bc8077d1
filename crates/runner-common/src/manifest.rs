use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::execute::ExecutionRequest;

/// File name of the manifest inside a request's staging directory.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Environment variable through which a job learns where its manifest lives.
pub const MANIFEST_PATH_VAR: &str = "MANIFEST_FILE_PATH";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest {path} is malformed: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode manifest: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Hand-off record between the server that stages a project and the worker
/// that runs it. The worker takes every execution parameter from here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub request_id: String,
    pub project_path: String,
    pub request: ExecutionRequest,
}

impl Manifest {
    pub fn path_in(cache_dir: &Path) -> PathBuf {
        cache_dir.join(MANIFEST_FILE_NAME)
    }

    pub fn to_json_vec(&self) -> Result<Vec<u8>, ManifestError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let raw = std::fs::read(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&raw).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
