//! JSON-RPC over HTTP
//!
//! [`RpcTransport`] is the seam every chain read goes through. The HTTP
//! implementation applies a per-call timeout and maps each failure mode to a
//! classified [`Error`] so the retry and rotation layers can decide what to
//! do with it.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};

/// Issues one JSON-RPC request against one endpoint
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Send `method(params)` to `url` and return the `result` member.
    ///
    /// A JSON-RPC `error` member maps to [`Error::Rpc`]; a `null` result is
    /// returned as [`Value::Null`].
    async fn request(&self, url: &str, method: &str, params: Value) -> Result<Value>;
}

/// JSON-RPC response envelope
#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// reqwest-backed transport with a per-call timeout
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self {
            client,
            timeout,
            next_id: AtomicU64::new(1),
        })
    }

    fn map_reqwest(&self, url: &str, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            return Error::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            };
        }
        if let Some(status) = e.status() {
            return Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            };
        }
        Error::Transport(e.to_string())
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn request(&self, url: &str, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        });

        debug!(url = %url, method, id, "JSON-RPC request");

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let envelope = response
            .json::<RpcResponse>()
            .await
            .map_err(|e| self.map_reqwest(url, e))?;

        decode_envelope(envelope)
    }
}

fn decode_envelope(envelope: RpcResponse) -> Result<Value> {
    if let Some(error) = envelope.error {
        return Err(Error::Rpc {
            code: error.code,
            message: error.message,
        });
    }
    Ok(envelope.result.unwrap_or(Value::Null))
}
