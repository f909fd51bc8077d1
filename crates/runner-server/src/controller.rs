use std::path::PathBuf;
use std::process::{ExitCode, ExitStatus};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use runner_common::{Activity, ConfigError, LaunchParameters};
use runner_platform::HttpPlatform;
use runner_sdk::{CommandOptions, Credentials, Dispatcher};
use tracing::{info, warn};

use crate::args::Args;
use crate::handlers::router;
use crate::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::state::AppState;
use crate::worker::WorkerLauncher;

/// Server-side settings; only consulted when acting as the server.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub storage_root: Option<PathBuf>,
    pub platform_url: Option<String>,
    pub app_source: Option<String>,
    pub worker_command: String,
    pub platform_options: CommandOptions,
}

impl From<&Args> for ServerSettings {
    fn from(args: &Args) -> Self {
        Self {
            storage_root: args.storage_root.clone(),
            platform_url: args.platform_url.clone(),
            app_source: args.app_source.clone(),
            worker_command: args.worker_command.clone(),
            platform_options: CommandOptions::new(
                Duration::from_millis(args.platform_sleep_ms),
                args.platform_retry_count,
                Duration::from_secs(args.platform_timeout_secs),
            ),
        }
    }
}

pub struct ActivityController {
    settings: ServerSettings,
}

impl ActivityController {
    pub fn new(settings: ServerSettings) -> Self {
        Self { settings }
    }

    pub async fn execute(&self, params: &LaunchParameters) -> anyhow::Result<ExitCode> {
        match params.activity {
            Activity::Server => {
                self.launch_server(params).await?;
                Ok(ExitCode::SUCCESS)
            }
            Activity::Worker => {
                let status = WorkerLauncher::from_env()?.run().await?;
                Ok(exit_code(status))
            }
        }
    }

    async fn launch_server(&self, params: &LaunchParameters) -> anyhow::Result<()> {
        let orchestrator = self.build_orchestrator().await?;
        let app = router(AppState {
            orchestrator: Arc::new(orchestrator),
        });

        let addr = params.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!(%addr, "runner api listening");

        axum::serve(listener, app).await?;
        Ok(())
    }

    async fn build_orchestrator(&self) -> anyhow::Result<Orchestrator> {
        let storage_root = self
            .settings
            .storage_root
            .clone()
            .ok_or_else(|| ConfigError::MissingVar("RUNNER_PERSISTENT_STORAGE".to_string()))?;
        let platform_url = self
            .settings
            .platform_url
            .clone()
            .ok_or_else(|| ConfigError::MissingVar("RUNNER_PLATFORM_URL".to_string()))?;

        tokio::fs::create_dir_all(&storage_root)
            .await
            .with_context(|| format!("cannot create storage root {}", storage_root.display()))?;
        let storage_root = tokio::fs::canonicalize(&storage_root).await?;

        if self.settings.app_source.is_none() {
            warn!("APP_SOURCE not set; execute requests will fail at job submission");
        }

        let credentials = Credentials::from_env();
        if let Err(e) = credentials.refresh().await {
            warn!(error = %e, "no platform credential at startup, relying on reauthorization");
        }

        let platform = HttpPlatform::new(Dispatcher::with_reqwest(credentials), platform_url)
            .with_options(self.settings.platform_options);

        info!(storage_root = %storage_root.display(), "orchestrator ready");
        Ok(Orchestrator::new(
            Arc::new(platform),
            OrchestratorConfig {
                storage_root,
                app_source: self.settings.app_source.clone(),
                worker_command: self.settings.worker_command.clone(),
            },
        ))
    }
}

/// Map a child's exit status onto this process's exit code. Termination by
/// signal has no code and is reported as 1.
fn exit_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        None => ExitCode::from(1),
    }
}
