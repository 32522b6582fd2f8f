//! The reputation lookup client.
//!
//! [`Lookup`] is the seam between the executor and the network: the executor
//! only ever sees a key going in and a [`LookupOutcome`] coming out.
//! [`ReputationClient`] is the real implementation; any
//! `Fn(LookupKey) -> impl Future<Output = LookupOutcome>` closure works too,
//! which is how tests inject stubs.

use crate::{
    config::{StressConfig, KEY_SLOT},
    error::{ConfigError, ConfigResult},
    metric::{LookupKey, LookupOutcome},
};
use reqwest::{
    header::{HeaderValue, AUTHORIZATION},
    Client, StatusCode,
};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::time::Instant;

/// Performs one lookup and classifies its outcome.
///
/// Implementations never fail: every failure mode is encoded in the returned
/// [`LookupOutcome`]. They are cloned into each worker and called concurrently,
/// so they must not rely on shared mutable state.
pub trait Lookup
where
    Self: Send + Sync + Clone + 'static,
{
    fn lookup(&self, key: LookupKey) -> impl Future<Output = LookupOutcome> + Send;
}

impl<F, Fut> Lookup for F
where
    F: Fn(LookupKey) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = LookupOutcome> + Send,
{
    fn lookup(&self, key: LookupKey) -> impl Future<Output = LookupOutcome> + Send {
        self(key)
    }
}

/// HTTP client for the reputation endpoint.
///
/// Cheap to clone: the underlying connection pool is shared between clones.
#[derive(Clone, Debug)]
pub struct ReputationClient {
    http: Client,
    url_template: Arc<str>,
    authorization: HeaderValue,
}

impl ReputationClient {
    /// Build a client for `url_template`, which must contain one `{}` slot.
    pub fn new(
        url_template: impl AsRef<str>,
        auth_token: &str,
        timeout: Option<Duration>,
    ) -> ConfigResult<Self> {
        let mut authorization = HeaderValue::from_str(&format!("Token {auth_token}"))
            .map_err(|e| ConfigError::ValidationError(format!("invalid auth_token: {e}")))?;
        authorization.set_sensitive(true);

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            url_template: Arc::from(url_template.as_ref()),
            authorization,
        })
    }

    pub fn from_config(config: &StressConfig) -> ConfigResult<Self> {
        Self::new(&config.api_url, &config.auth_token, config.request_timeout())
    }

    /// The URL queried for `key`.
    pub fn endpoint(&self, key: &LookupKey) -> String {
        self.url_template.replacen(KEY_SLOT, key.as_str(), 1)
    }
}

impl Lookup for ReputationClient {
    fn lookup(&self, key: LookupKey) -> impl Future<Output = LookupOutcome> + Send {
        let request = self
            .http
            .get(self.endpoint(&key))
            .header(AUTHORIZATION, self.authorization.clone());

        async move {
            let start = Instant::now();
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!("Lookup for {key} failed: {e}");
                    return LookupOutcome::transport_error(e.to_string());
                }
            };

            let status = response.status();
            // A body that cannot be read means no complete response was received.
            if let Err(e) = response.bytes().await {
                tracing::debug!("Reading response for {key} failed: {e}");
                return LookupOutcome::transport_error(e.to_string());
            }
            let latency = start.elapsed();

            if status == StatusCode::OK {
                LookupOutcome::success(latency)
            } else {
                LookupOutcome::http_error(status.as_u16(), latency)
            }
        }
    }
}
