use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::error::DispatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Delete,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Verb::Get),
            "POST" => Ok(Verb::Post),
            "DELETE" => Ok(Verb::Delete),
            _ => Err(DispatchError::UnsupportedVerb(s.to_string())),
        }
    }
}

/// Branch the dispatcher takes for a received status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Allow,
    Retry,
    Reauth,
    Unclassified,
}

/// Explicit allow / retry / reauth status sets.
///
/// The sets are expected to be disjoint but this is not enforced; membership
/// is checked in the order allow, retry, reauth. Anything outside all three is
/// a hard failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusClassification {
    pub allow: BTreeSet<u16>,
    pub retry: BTreeSet<u16>,
    pub reauth: BTreeSet<u16>,
}

impl StatusClassification {
    pub fn new(
        allow: impl IntoIterator<Item = u16>,
        retry: impl IntoIterator<Item = u16>,
        reauth: impl IntoIterator<Item = u16>,
    ) -> Self {
        Self {
            allow: allow.into_iter().collect(),
            retry: retry.into_iter().collect(),
            reauth: reauth.into_iter().collect(),
        }
    }

    pub fn classify(&self, status: u16) -> StatusClass {
        if self.allow.contains(&status) {
            StatusClass::Allow
        } else if self.retry.contains(&status) {
            StatusClass::Retry
        } else if self.reauth.contains(&status) {
            StatusClass::Reauth
        } else {
            StatusClass::Unclassified
        }
    }
}

/// Backoff and bounds for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOptions {
    /// Pause before re-sending after a transport failure or a retry status.
    pub sleep_time: Duration,
    /// Total number of attempts allowed.
    pub retry_count: u32,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

impl CommandOptions {
    pub fn new(sleep_time: Duration, retry_count: u32, timeout: Duration) -> Self {
        Self {
            sleep_time,
            retry_count,
            timeout,
        }
    }
}

/// One outbound call, fully described. Never modified between attempts.
#[derive(Debug, Clone, Serialize)]
pub struct WrappedRequest {
    pub verb: Verb,
    pub url: String,
    pub statuses: StatusClassification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<BTreeMap<String, String>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_file_names"
    )]
    pub files: Option<BTreeMap<String, Vec<u8>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<BTreeMap<String, String>>,
}

// Snapshots carry file names and sizes, not contents.
fn serialize_file_names<S>(
    files: &Option<BTreeMap<String, Vec<u8>>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let summary: Option<BTreeMap<&str, usize>> = files
        .as_ref()
        .map(|f| f.iter().map(|(k, v)| (k.as_str(), v.len())).collect());
    summary.serialize(serializer)
}

impl WrappedRequest {
    pub fn new(verb: Verb, url: impl Into<String>, statuses: StatusClassification) -> Self {
        Self {
            verb,
            url: url.into(),
            statuses,
            body: None,
            form: None,
            files: None,
            params: None,
        }
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn form_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn file(mut self, name: impl Into<String>, content: Vec<u8>) -> Self {
        self.files
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), content);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for WrappedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb, self.url)
    }
}
