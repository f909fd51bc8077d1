use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use runner_common::{demand_env, ConfigError};
use tokio::sync::RwLock;

/// Secret consulted whenever a response asks for reauthorization.
pub const AUTH_TOKEN_VAR: &str = "RUNNER_AUTH_TOKEN";

pub trait TokenSource: Send + Sync {
    fn token(&self) -> Result<String, ConfigError>;
}

/// Reads the bearer token from an environment variable on every refresh, so a
/// rotated secret is picked up without a restart.
#[derive(Debug, Clone)]
pub struct EnvTokenSource {
    var: String,
}

impl EnvTokenSource {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvTokenSource {
    fn default() -> Self {
        Self::new(AUTH_TOKEN_VAR)
    }
}

impl TokenSource for EnvTokenSource {
    fn token(&self) -> Result<String, ConfigError> {
        demand_env(&self.var)
    }
}

#[derive(Debug, Clone)]
pub struct StaticTokenSource(pub String);

impl TokenSource for StaticTokenSource {
    fn token(&self) -> Result<String, ConfigError> {
        Ok(self.0.clone())
    }
}

/// Bearer credential shared by every call made through one dispatcher.
///
/// Clones share state: a refresh triggered by one request is seen by all
/// later attempts of every other request. Refreshes are serialized by the
/// write lock.
#[derive(Clone)]
pub struct Credentials {
    bearer: Arc<RwLock<Option<String>>>,
    source: Arc<dyn TokenSource>,
    refreshes: Arc<AtomicU64>,
}

impl Credentials {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            bearer: Arc::new(RwLock::new(None)),
            source,
            refreshes: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_env() -> Self {
        Self::new(Arc::new(EnvTokenSource::default()))
    }

    /// Seed an initial token without consulting the source.
    pub fn with_token(self, token: impl Into<String>) -> Self {
        Self {
            bearer: Arc::new(RwLock::new(Some(token.into()))),
            ..self
        }
    }

    pub async fn current(&self) -> Option<String> {
        self.bearer.read().await.clone()
    }

    pub async fn refresh(&self) -> Result<(), ConfigError> {
        let mut bearer = self.bearer.write().await;
        let token = self.source.token()?;
        *bearer = Some(token);
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("bearer credential refreshed");
        Ok(())
    }

    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("bearer", &"<redacted>")
            .field("refreshes", &self.refresh_count())
            .finish()
    }
}
