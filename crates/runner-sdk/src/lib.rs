//! Client side of the runner: the resilient request dispatcher used for every
//! outbound platform call, and the SDK client that submits execute requests.

pub mod client;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod request;
pub mod transport;

pub use client::{ClientError, RunnerClient, EXECUTE_PATH, HOSTNAME_VAR};
pub use credentials::{Credentials, EnvTokenSource, StaticTokenSource, TokenSource, AUTH_TOKEN_VAR};
pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use request::{CommandOptions, StatusClass, StatusClassification, Verb, WrappedRequest};
pub use transport::{ReqwestTransport, Transport, TransportError, TransportResponse};
