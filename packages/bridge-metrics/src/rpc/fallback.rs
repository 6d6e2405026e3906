//! Endpoint rotation
//!
//! An [`EndpointSet`] is the ordered RPC URL list of one chain. [`rotate`]
//! runs an operation against each URL in turn until one succeeds; only
//! failures the caller's predicate accepts move on to the next URL, anything
//! else is returned immediately. [`RotatingClient`] composes rotation with
//! the per-endpoint retry of [`super::retry`].

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::retry::{with_retry, RetryConfig};
use super::transport::RpcTransport;
use crate::clock::Clock;
use crate::config::ChainConfig;
use crate::error::{Error, Result};

/// Ordered RPC URLs of one chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSet {
    label: String,
    urls: Vec<String>,
}

impl EndpointSet {
    pub fn new(label: impl Into<String>, urls: Vec<String>) -> Result<Self> {
        let label = label.into();
        if urls.is_empty() {
            return Err(Error::NoEndpoints(label));
        }
        Ok(Self { label, urls })
    }

    pub fn from_chain(chain: &ChainConfig) -> Result<Self> {
        Self::new(chain.name.clone(), chain.rpc_urls.clone())
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Run `operation` against each endpoint in order, first success wins.
///
/// Errors rejected by `is_rotatable` are returned as-is. When every
/// endpoint fails rotatably the result is [`Error::EndpointsExhausted`]
/// wrapping the last failure.
pub async fn rotate<T, F, Fut, P>(
    endpoints: &EndpointSet,
    is_rotatable: P,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let mut last_error = None;

    for (index, url) in endpoints.urls.iter().enumerate() {
        match operation(url.clone()).await {
            Ok(value) => {
                if index > 0 {
                    debug!(chain = %endpoints.label, url = %url, index, "Fallback endpoint succeeded");
                }
                return Ok(value);
            }
            Err(e) if is_rotatable(&e) => {
                warn!(
                    chain = %endpoints.label,
                    url = %url,
                    error = %e,
                    "RPC endpoint failed, rotating"
                );
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(Error::EndpointsExhausted {
        attempted: endpoints.len(),
        last: Box::new(
            last_error.unwrap_or_else(|| Error::NoEndpoints(endpoints.label.clone())),
        ),
    })
}

/// JSON-RPC client for one chain: retry with backoff on each endpoint,
/// then rotate to the next one on transient failure.
#[derive(Clone)]
pub struct RotatingClient {
    endpoints: EndpointSet,
    transport: Arc<dyn RpcTransport>,
    retry: RetryConfig,
    clock: Arc<dyn Clock>,
}

impl RotatingClient {
    pub fn new(
        endpoints: EndpointSet,
        transport: Arc<dyn RpcTransport>,
        retry: RetryConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            endpoints,
            transport,
            retry,
            clock,
        }
    }

    pub fn endpoints(&self) -> &EndpointSet {
        &self.endpoints
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Raw request with retry and rotation
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let params = &params;
        rotate(&self.endpoints, Error::is_transient, |url| async move {
            self.request_at(&url, method, params.clone()).await
        })
        .await
    }

    /// Request against one endpoint, retried but never rotated
    pub async fn request_at(&self, url: &str, method: &str, params: Value) -> Result<Value> {
        let params = &params;
        with_retry(
            &self.retry,
            self.clock.as_ref(),
            method,
            Error::is_transient,
            |_| self.transport.request(url, method, params.clone()),
        )
        .await
    }

    /// Typed request with retry and rotation
    pub async fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R> {
        let value = self.request(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Typed request against one endpoint
    pub async fn call_at<R: DeserializeOwned>(
        &self,
        url: &str,
        method: &str,
        params: Value,
    ) -> Result<R> {
        let value = self.request_at(url, method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Run a multi-call operation per endpoint, rotating on errors that
    /// `is_rotatable` accepts
    pub async fn with_rotation<T, F, Fut, P>(&self, is_rotatable: P, operation: F) -> Result<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&Error) -> bool,
    {
        rotate(&self.endpoints, is_rotatable, operation).await
    }
}
