use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use runner_sdk::{CommandOptions, Dispatcher, StatusClassification, Verb, WrappedRequest};

use crate::types::{JobCreateParams, JobCreateResponse, Platform, PlatformError};

const RETRY_STATUSES: [u16; 3] = [502, 503, 504];
const REAUTH_STATUSES: [u16; 1] = [401];

/// Platform reached over its REST API. Every call goes through the shared
/// dispatcher, so all requests see the same bearer credential.
#[derive(Clone)]
pub struct HttpPlatform {
    dispatcher: Dispatcher,
    base_url: String,
    options: CommandOptions,
}

impl HttpPlatform {
    pub fn default_options() -> CommandOptions {
        CommandOptions::new(Duration::from_secs(1), 5, Duration::from_secs(60))
    }

    pub fn new(dispatcher: Dispatcher, base_url: impl Into<String>) -> Self {
        Self {
            dispatcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            options: Self::default_options(),
        }
    }

    pub fn with_options(mut self, options: CommandOptions) -> Self {
        self.options = options;
        self
    }

    pub fn archive_request(&self, project_id: &str) -> WrappedRequest {
        let url = format!(
            "{}/api/v2/projects/{}/archive",
            self.base_url,
            urlencoding::encode(project_id)
        );
        WrappedRequest::new(
            Verb::Get,
            url,
            StatusClassification::new([200], RETRY_STATUSES, REAUTH_STATUSES),
        )
        .query("format", "tar.gz")
    }

    pub fn job_request(&self, params: &JobCreateParams) -> WrappedRequest {
        let url = format!(
            "{}/api/v2/projects/{}/jobs",
            self.base_url,
            urlencoding::encode(&params.ident)
        );
        let body = serde_json::json!({
            "name": params.name,
            "command": params.command,
            "variables": params.variables,
            "run": params.run,
        });
        WrappedRequest::new(
            Verb::Post,
            url,
            StatusClassification::new([200, 201], RETRY_STATUSES, REAUTH_STATUSES),
        )
        .json(body)
    }
}

#[async_trait]
impl Platform for HttpPlatform {
    async fn download_project(&self, project_id: &str, dest: &Path) -> Result<(), PlatformError> {
        let req = self.archive_request(project_id);
        let body = self
            .dispatcher
            .dispatch_bytes(&req, &self.options)
            .await?
            .unwrap_or_default();
        tracing::debug!(project_id, bytes = body.len(), dest = %dest.display(), "archive downloaded");
        tokio::fs::write(dest, &body)
            .await
            .map_err(|source| PlatformError::Io {
                path: dest.to_path_buf(),
                source,
            })
    }

    async fn create_job(&self, params: &JobCreateParams) -> Result<JobCreateResponse, PlatformError> {
        let req = self.job_request(params);
        let body = self
            .dispatcher
            .dispatch(&req, &self.options)
            .await?
            .ok_or_else(|| PlatformError::Decode("empty body".to_string()))?;
        serde_json::from_value(body).map_err(|e| PlatformError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;
    use std::sync::Arc;

    use axum::extract::Path as UrlPath;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use runner_sdk::{Credentials, StaticTokenSource};

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn platform(base: String) -> HttpPlatform {
        let creds = Credentials::new(Arc::new(StaticTokenSource("t".into()))).with_token("t");
        HttpPlatform::new(Dispatcher::with_reqwest(creds), base).with_options(CommandOptions::new(
            Duration::from_millis(5),
            2,
            Duration::from_secs(5),
        ))
    }

    fn params() -> JobCreateParams {
        let mut variables = BTreeMap::new();
        variables.insert("MANIFEST_FILE_PATH".to_string(), "/s/r/manifest.json".to_string());
        JobCreateParams {
            name: "req-1".to_string(),
            ident: "a0-f2dff223".to_string(),
            command: "Worker".to_string(),
            variables,
            run: true,
        }
    }

    #[test]
    fn test_archive_request_encodes_project_id() {
        let p = platform("https://ae.example/".to_string());
        let req = p.archive_request("team/project one");
        assert_eq!(
            req.url,
            "https://ae.example/api/v2/projects/team%2Fproject%20one/archive"
        );
        assert_eq!(req.verb, Verb::Get);
    }

    #[tokio::test]
    async fn test_download_writes_archive_bytes() {
        let app = Router::new().route(
            "/api/v2/projects/:id/archive",
            get(|UrlPath(id): UrlPath<String>| async move {
                if id == "abc" {
                    (StatusCode::OK, b"archive-bytes".to_vec())
                } else {
                    (StatusCode::NOT_FOUND, Vec::new())
                }
            }),
        );
        let p = platform(spawn(app).await);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("abc.tar.gz");

        p.download_project("abc", &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"archive-bytes");

        let err = p
            .download_project("missing", &dir.path().join("missing.tar.gz"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Dispatch(ref e) if e.status_code() == Some(404)));
    }

    #[tokio::test]
    async fn test_create_job_posts_params() {
        let app = Router::new().route(
            "/api/v2/projects/:ident/jobs",
            post(
                |UrlPath(ident): UrlPath<String>, Json(body): Json<serde_json::Value>| async move {
                    assert_eq!(ident, "a0-f2dff223");
                    assert_eq!(body["command"], "Worker");
                    assert_eq!(body["run"], true);
                    assert_eq!(body["variables"]["MANIFEST_FILE_PATH"], "/s/r/manifest.json");
                    (
                        StatusCode::CREATED,
                        Json(serde_json::json!({"id": "job-42", "name": body["name"]})),
                    )
                },
            ),
        );
        let p = platform(spawn(app).await);

        let resp = p.create_job(&params()).await.unwrap();
        assert_eq!(resp.id, "job-42");
        assert_eq!(resp.name.as_deref(), Some("req-1"));
    }
}
