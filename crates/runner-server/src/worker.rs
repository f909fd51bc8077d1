use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use runner_common::{demand_env, ConfigError, Manifest, ManifestError, MANIFEST_PATH_VAR};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("manifest command is empty")]
    EmptyCommand,

    #[error("cannot split command {0:?} into arguments")]
    UnparsableCommand(String),

    #[error("failed to launch {program} in {cwd}: {source}")]
    Spawn {
        program: String,
        cwd: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed while running command: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs the command recorded in a staged manifest.
pub struct WorkerLauncher {
    manifest_path: PathBuf,
}

impl WorkerLauncher {
    pub fn new(manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
        }
    }

    pub fn from_env() -> Result<Self, WorkerError> {
        Self::from_var(MANIFEST_PATH_VAR)
    }

    pub fn from_var(var: &str) -> Result<Self, WorkerError> {
        Ok(Self::new(demand_env(var)?))
    }

    pub async fn run(&self) -> Result<ExitStatus, WorkerError> {
        info!(manifest = %self.manifest_path.display(), "launching worker");
        let manifest = Manifest::load(&self.manifest_path)?;
        let request_id = manifest.request_id.clone();

        info!(request_id = %request_id, project_path = %manifest.project_path, "processing request");
        let status = run_manifest(&manifest, |line| {
            info!(request_id = %request_id, "{line}");
        })
        .await?;
        info!(request_id = %request_id, %status, "complete");

        // The staging directory is left in place on purpose; nothing removes
        // <storage_root>/<request_id> after a run.
        Ok(status)
    }
}

/// Spawn the manifest's command inside its project directory and feed each
/// stdout line to `on_line` as it arrives. Stderr is inherited.
pub async fn run_manifest(
    manifest: &Manifest,
    mut on_line: impl FnMut(&str),
) -> Result<ExitStatus, WorkerError> {
    let command = &manifest.request.command;
    let args = shlex::split(command).ok_or_else(|| WorkerError::UnparsableCommand(command.clone()))?;
    let (program, rest) = args.split_first().ok_or(WorkerError::EmptyCommand)?;

    let mut child = Command::new(program)
        .args(rest)
        .current_dir(&manifest.project_path)
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|source| WorkerError::Spawn {
            program: program.clone(),
            cwd: manifest.project_path.clone(),
            source,
        })?;

    if let Some(stdout) = child.stdout.take() {
        if let Err(e) = stream_lines(stdout, &mut on_line).await {
            warn!(error = %e, "lost the command's stdout, stopping it");
            let _ = child.start_kill();
            child.wait().await?;
            return Err(e.into());
        }
    }

    Ok(child.wait().await?)
}

/// Lines are split on `\n` and decoded lossily; output is never rejected for
/// its encoding.
async fn stream_lines(
    stdout: impl AsyncRead + Unpin,
    on_line: &mut impl FnMut(&str),
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        on_line(&String::from_utf8_lossy(&buf));
    }
}
