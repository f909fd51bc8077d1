pub mod activity;
pub mod env;
pub mod execute;
pub mod manifest;

pub use activity::{Activity, LaunchParameters};
pub use env::{demand_env, ConfigError};
pub use execute::{ExecutionRequest, ExecutionResponse};
pub use manifest::{Manifest, ManifestError, MANIFEST_FILE_NAME, MANIFEST_PATH_VAR};

pub mod telemetry;
