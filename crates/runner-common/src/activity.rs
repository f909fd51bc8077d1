use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::env::ConfigError;

pub const DEFAULT_PORT: u16 = 8086;
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// The role this process plays for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    /// Serve the execute API.
    Server,
    /// Run the command described by a staged manifest.
    Worker,
}

impl Activity {
    pub fn as_str(self) -> &'static str {
        match self {
            Activity::Server => "server",
            Activity::Worker => "worker",
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Activity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "server" => Ok(Activity::Server),
            "worker" => Ok(Activity::Worker),
            other => Err(ConfigError::UnsupportedActivity(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParameters {
    pub port: u16,
    pub address: String,
    pub activity: Activity,
}

impl LaunchParameters {
    pub fn new(activity: Activity) -> Self {
        Self {
            port: DEFAULT_PORT,
            address: DEFAULT_ADDRESS.to_string(),
            activity,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_activity() {
        assert_eq!("server".parse::<Activity>().unwrap(), Activity::Server);
        assert_eq!(" Worker ".parse::<Activity>().unwrap(), Activity::Worker);
        let err = "scheduler".parse::<Activity>().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedActivity(ref a) if a == "scheduler"));
    }

    #[test]
    fn test_launch_defaults() {
        let params = LaunchParameters::new(Activity::Server);
        assert_eq!(params.bind_addr(), "0.0.0.0:8086");
    }
}
