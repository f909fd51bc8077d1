use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::credentials::Credentials;
use crate::error::DispatchError;
use crate::request::{CommandOptions, StatusClass, WrappedRequest};
use crate::transport::{ReqwestTransport, Transport, TransportError};

/// Sends one logical request with bounded attempts.
///
/// Every attempt consumes one unit of `retry_count`. Transport failures and
/// retry statuses sleep `sleep_time` before the next attempt; reauth statuses
/// refresh the shared credential and go again immediately. Once the counter
/// is exhausted the dispatch fails with [`DispatchError::ExceededRetryCount`].
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    credentials: Credentials,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, credentials: Credentials) -> Self {
        Self {
            transport,
            credentials,
        }
    }

    pub fn with_reqwest(credentials: Credentials) -> Self {
        Self::new(Arc::new(ReqwestTransport::new()), credentials)
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Dispatch and decode the body as JSON. An empty allowed body is `None`.
    pub async fn dispatch(
        &self,
        request: &WrappedRequest,
        options: &CommandOptions,
    ) -> Result<Option<serde_json::Value>, DispatchError> {
        let Some(body) = self.dispatch_bytes(request, options).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|source| DispatchError::Decode {
                url: request.url.clone(),
                source,
            })
    }

    /// Dispatch and hand back the raw body of the allowed response.
    pub async fn dispatch_bytes(
        &self,
        request: &WrappedRequest,
        options: &CommandOptions,
    ) -> Result<Option<Bytes>, DispatchError> {
        let mut remaining = i64::from(options.retry_count);

        loop {
            if remaining < 1 {
                warn!(request=%request, depth=remaining, "retry count exhausted");
                return Err(DispatchError::ExceededRetryCount {
                    request: Box::new(request.clone()),
                    depth: remaining,
                });
            }
            remaining -= 1;

            let bearer = self.credentials.current().await;
            let resp = match self
                .transport
                .send(request, bearer.as_deref(), options.timeout)
                .await
            {
                Ok(resp) => resp,
                Err(TransportError::InvalidRequest(reason)) => {
                    return Err(DispatchError::InvalidRequest {
                        request: Box::new(request.clone()),
                        reason,
                    });
                }
                Err(e) => {
                    debug!(request=%request, error=%e, depth=remaining, "transport failure, retrying");
                    tokio::time::sleep(options.sleep_time).await;
                    continue;
                }
            };

            match request.statuses.classify(resp.status) {
                StatusClass::Allow => {
                    if resp.body.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(resp.body));
                }
                StatusClass::Retry => {
                    debug!(request=%request, status=resp.status, depth=remaining, "retryable status");
                    tokio::time::sleep(options.sleep_time).await;
                }
                StatusClass::Reauth => {
                    debug!(request=%request, status=resp.status, depth=remaining, "reauthorizing");
                    self.credentials.refresh().await?;
                }
                StatusClass::Unclassified => {
                    return Err(DispatchError::RequestFailure {
                        status_code: resp.status,
                        request: Box::new(request.clone()),
                        depth: remaining,
                    });
                }
            }
        }
    }
}
