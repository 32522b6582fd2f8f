use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc, time::Duration};

/// A `Metric` is a single observation produced by one lookup against the system
/// under test.
///
/// Metrics are the most granular data the harness deals with. They are gathered
/// by an [`crate::Aggregate`], summarized by a [`crate::Report`] and finally handed
/// to a [`crate::Reporter`].
///
/// Metrics cross task boundaries (worker to collector), so they must be `Send`,
/// `Sync` and `'static`.
pub trait Metric
where
    Self: PartialEq + Send + Sync + Clone + fmt::Debug + 'static,
{
}

/// The identifier submitted to the reputation endpoint, usually a domain name.
///
/// Cheap to clone: the same key is handed to many workers when keys are drawn
/// at random from a small pool.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LookupKey(Arc<str>);

impl LookupKey {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LookupKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for LookupKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// The recorded result of one lookup attempt.
///
/// A latency is carried only when the endpoint actually answered, so an
/// outcome with a transport failure can never hold a measured latency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LookupOutcome {
    /// The endpoint answered with `200 OK`.
    Success { latency: Duration },
    /// The endpoint answered with any other status code.
    HttpError { code: u16, latency: Duration },
    /// No response was received: connection refused, DNS, timeout, broken body...
    TransportError { message: String },
}

impl Metric for LookupOutcome {}

impl LookupOutcome {
    pub fn success(latency: Duration) -> Self {
        Self::Success { latency }
    }

    pub fn http_error(code: u16, latency: Duration) -> Self {
        Self::HttpError { code, latency }
    }

    pub fn transport_error(message: impl Into<String>) -> Self {
        Self::TransportError {
            message: message.into(),
        }
    }

    /// Measured latency, absent for transport failures.
    pub fn latency(&self) -> Option<Duration> {
        match self {
            Self::Success { latency } | Self::HttpError { latency, .. } => Some(*latency),
            Self::TransportError { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Human readable error description, `None` for successes.
    ///
    /// HTTP errors render as their bare status code, transport errors as their
    /// message.
    pub fn error(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::HttpError { code, .. } => Some(code.to_string()),
            Self::TransportError { message } => Some(message.clone()),
        }
    }
}
