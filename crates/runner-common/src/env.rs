use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingVar(String),

    #[error("environment variable {name} is malformed: {reason}")]
    InvalidVar { name: String, reason: String },

    #[error("launch type {0} is not supported")]
    UnsupportedActivity(String),
}

/// Read a required environment value. Empty values count as missing.
pub fn demand_env(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name.to_string())),
    }
}
