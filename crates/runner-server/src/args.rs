use std::path::PathBuf;

use clap::Parser;
use runner_common::activity::{DEFAULT_ADDRESS, DEFAULT_PORT};
use runner_common::{Activity, LaunchParameters};

#[derive(Debug, Parser)]
#[command(name = "runner", author, version, about = "Stage projects and run them as platform jobs")]
pub struct Args {
    /// The function (server, worker) to perform.
    #[arg(long, value_enum, env = "RUNNER_ACTIVITY")]
    pub activity: Activity,

    /// IP address the server listens on.
    #[arg(long, env = "RUNNER_ADDRESS", default_value = DEFAULT_ADDRESS)]
    pub address: String,

    /// Port the server listens on.
    #[arg(long, env = "RUNNER_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Root under which every request gets its own staging directory.
    #[arg(long, env = "RUNNER_PERSISTENT_STORAGE")]
    pub storage_root: Option<PathBuf>,

    /// Base URL of the platform API (archive downloads and job creation).
    #[arg(long, env = "RUNNER_PLATFORM_URL")]
    pub platform_url: Option<String>,

    /// Deployment location of this service; its project segment names the jobs' project.
    #[arg(long, env = "APP_SOURCE")]
    pub app_source: Option<String>,

    /// Project command the scheduler runs for workers.
    #[arg(long, env = "RUNNER_WORKER_COMMAND", default_value = "Worker")]
    pub worker_command: String,

    #[arg(long, env = "RUNNER_PLATFORM_RETRY_COUNT", default_value_t = 5)]
    pub platform_retry_count: u32,

    #[arg(long, env = "RUNNER_PLATFORM_SLEEP_MS", default_value_t = 1_000)]
    pub platform_sleep_ms: u64,

    #[arg(long, env = "RUNNER_PLATFORM_TIMEOUT_SECS", default_value_t = 60)]
    pub platform_timeout_secs: u64,

    /// OTLP endpoint for exporting traces.
    #[arg(long, env = "OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Bearer token for the OTLP endpoint.
    #[arg(long, env = "OTLP_TOKEN")]
    pub otlp_token: Option<String>,
}

impl Args {
    pub fn launch_parameters(&self) -> LaunchParameters {
        LaunchParameters {
            port: self.port,
            address: self.address.clone(),
            activity: self.activity,
        }
    }
}
