use std::collections::BTreeMap;
use std::time::Duration;

use runner_common::{demand_env, ConfigError, ExecutionRequest, ExecutionResponse};
use thiserror::Error;

use crate::credentials::Credentials;
use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::request::{CommandOptions, StatusClassification, Verb, WrappedRequest};

pub const EXECUTE_PATH: &str = "/api/v1/execute";
pub const HOSTNAME_VAR: &str = "RUNNER_HOSTNAME";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to encode execute request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("execute endpoint returned an empty body")]
    EmptyResponse,

    #[error("execute endpoint returned an unexpected body: {0}")]
    Decode(#[source] serde_json::Error),
}

/// SDK entry point for submitting execute requests to a runner service.
///
/// Backoff policy belongs to the client: 1s between attempts, at most ten
/// attempts, 5s per attempt, unless overridden with [`RunnerClient::with_options`].
#[derive(Clone)]
pub struct RunnerClient {
    dispatcher: Dispatcher,
    base_url: String,
    options: CommandOptions,
}

impl RunnerClient {
    pub fn default_options() -> CommandOptions {
        CommandOptions::new(Duration::from_secs(1), 10, Duration::from_secs(5))
    }

    pub fn new(dispatcher: Dispatcher, base_url: impl Into<String>) -> Self {
        Self {
            dispatcher,
            base_url: base_url.into(),
            options: Self::default_options(),
        }
    }

    /// Target `https://$RUNNER_HOSTNAME`, authenticating with `$RUNNER_AUTH_TOKEN`.
    pub fn from_env() -> Result<Self, ClientError> {
        let hostname = demand_env(HOSTNAME_VAR)?;
        let dispatcher = Dispatcher::with_reqwest(Credentials::from_env());
        Ok(Self::new(dispatcher, format!("https://{hostname}")))
    }

    pub fn with_options(mut self, options: CommandOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &CommandOptions {
        &self.options
    }

    pub fn execute_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), EXECUTE_PATH)
    }

    pub fn build_execute_request(
        &self,
        request: &ExecutionRequest,
    ) -> Result<WrappedRequest, ClientError> {
        let body = serde_json::to_value(request).map_err(ClientError::Encode)?;
        Ok(WrappedRequest::new(
            Verb::Post,
            self.execute_url(),
            StatusClassification::new([201], [], [401]),
        )
        .json(body))
    }

    pub async fn submit(&self, request: &ExecutionRequest) -> Result<ExecutionResponse, ClientError> {
        let wrapped = self.build_execute_request(request)?;
        let body = self
            .dispatcher
            .dispatch(&wrapped, &self.options)
            .await?
            .ok_or(ClientError::EmptyResponse)?;
        serde_json::from_value(body).map_err(ClientError::Decode)
    }

    pub async fn execute(
        &self,
        project_id: &str,
        command: &str,
        variables: BTreeMap<String, String>,
    ) -> Result<ExecutionResponse, ClientError> {
        self.submit(&ExecutionRequest::new(project_id, command, variables))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::{routing::post, Json, Router};

    use crate::credentials::StaticTokenSource;

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn fast() -> CommandOptions {
        CommandOptions::new(Duration::from_millis(10), 4, Duration::from_secs(5))
    }

    #[test]
    fn test_execute_request_shape() {
        let creds = Credentials::new(Arc::new(StaticTokenSource("t".into())));
        let client = RunnerClient::new(Dispatcher::with_reqwest(creds), "https://runner.example/");
        let mut vars = BTreeMap::new();
        vars.insert("A".to_string(), "1".to_string());
        let wrapped = client
            .build_execute_request(&ExecutionRequest::new("abc", "run.sh", vars))
            .unwrap();

        assert_eq!(wrapped.verb, Verb::Post);
        assert_eq!(wrapped.url, "https://runner.example/api/v1/execute");
        assert_eq!(
            wrapped.statuses,
            StatusClassification::new([201], [], [401])
        );
        assert_eq!(
            wrapped.body,
            Some(serde_json::json!({"project_id": "abc", "command": "run.sh", "variables": {"A": "1"}}))
        );
        assert_eq!(client.options().retry_count, 10);
        assert_eq!(client.options().sleep_time, Duration::from_secs(1));
        assert_eq!(client.options().timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_submit_reauthorizes_against_live_server() {
        let app = Router::new().route(
            EXECUTE_PATH,
            post(|headers: HeaderMap, Json(req): Json<ExecutionRequest>| async move {
                let authorized = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    == Some("Bearer fresh");
                if !authorized {
                    return (StatusCode::UNAUTHORIZED, Json(serde_json::json!({}))).into_response();
                }
                let body = serde_json::json!({
                    "request_id": format!("req-for-{}", req.project_id),
                    "job_id": "job-7",
                });
                (StatusCode::CREATED, Json(body)).into_response()
            }),
        );
        let base = spawn(app).await;

        let creds = Credentials::new(Arc::new(StaticTokenSource("fresh".into())));
        let client =
            RunnerClient::new(Dispatcher::with_reqwest(creds.clone()), base).with_options(fast());
        let resp = client.execute("abc", "run.sh", BTreeMap::new()).await.unwrap();

        assert_eq!(resp.request_id, "req-for-abc");
        assert_eq!(resp.job_id.as_deref(), Some("job-7"));
        assert_eq!(creds.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_submit_surfaces_unclassified_status() {
        let app = Router::new().route(
            EXECUTE_PATH,
            post(|| async { (StatusCode::BAD_REQUEST, "no such project") }),
        );
        let base = spawn(app).await;

        let creds = Credentials::new(Arc::new(StaticTokenSource("t".into()))).with_token("t");
        let client = RunnerClient::new(Dispatcher::with_reqwest(creds), base).with_options(fast());
        let err = client.execute("abc", "run.sh", BTreeMap::new()).await.unwrap_err();
        match err {
            ClientError::Dispatch(e) => assert_eq!(e.status_code(), Some(400)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_submit_rejects_malformed_body() {
        let app = Router::new().route(
            EXECUTE_PATH,
            post(|| async { (StatusCode::CREATED, Json(serde_json::json!({"job": 1}))) }),
        );
        let base = spawn(app).await;

        let creds = Credentials::new(Arc::new(StaticTokenSource("t".into())));
        let client = RunnerClient::new(Dispatcher::with_reqwest(creds), base).with_options(fast());
        let err = client.execute("abc", "run.sh", BTreeMap::new()).await.unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_exhausts_retries() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let creds = Credentials::new(Arc::new(StaticTokenSource("t".into())));
        let client = RunnerClient::new(Dispatcher::with_reqwest(creds), format!("http://{addr}"))
            .with_options(CommandOptions::new(
                Duration::from_millis(5),
                2,
                Duration::from_secs(2),
            ));
        let err = client.execute("abc", "run.sh", BTreeMap::new()).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Dispatch(DispatchError::ExceededRetryCount { .. })
        ));
    }
}
