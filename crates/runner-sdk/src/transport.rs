use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use thiserror::Error;

use crate::request::{Verb, WrappedRequest};

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("transport error: {0}")]
    Other(String),

    /// The request could not be built at all; sending it again cannot help.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            TransportError::InvalidRequest(e.to_string())
        } else if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

/// Sends a single attempt. Implementations must not retry on their own.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &WrappedRequest,
        bearer: Option<&str>,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &WrappedRequest,
        bearer: Option<&str>,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let mut builder = match request.verb {
            Verb::Get => self.http.get(&request.url),
            Verb::Post => self.http.post(&request.url),
            Verb::Delete => self.http.delete(&request.url),
        };
        builder = builder.timeout(timeout);

        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(params) = request.params.as_ref() {
            builder = builder.query(params);
        }

        // Body and form data only travel with POST; files go with any verb.
        let form = if request.verb == Verb::Post {
            if let Some(body) = request.body.as_ref() {
                builder = builder.json(body);
            }
            request.form.as_ref()
        } else {
            None
        };

        match (request.files.as_ref(), form) {
            (Some(files), form) => {
                let mut multipart = Form::new();
                for (key, value) in form.into_iter().flatten() {
                    multipart = multipart.text(key.clone(), value.clone());
                }
                for (name, content) in files {
                    multipart = multipart.part(
                        name.clone(),
                        Part::bytes(content.clone()).file_name(name.clone()),
                    );
                }
                builder = builder.multipart(multipart);
            }
            (None, Some(form)) => {
                builder = builder.form(form);
            }
            (None, None) => {}
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?;
        Ok(TransportResponse { status, body })
    }
}
