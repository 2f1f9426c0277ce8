//! JSON-RPC 2.0 HTTP client with retry.
//!
//! `call()` POSTs to `/json_rpc`; `post()` hits the legacy raw endpoints.
//! Transient failures (timeouts, connect errors, 5xx, BUSY) are retried with
//! a delay that doubles per attempt. Compiled only with the `transport`
//! feature.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use base64::Engine;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcErrorBody>,
}

#[derive(Deserialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Base URL, e.g. `http://localhost:19081`.
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub retries: u32,
    /// Delay before the first retry; doubles each attempt.
    pub retry_delay: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:19081".to_string(),
            username: None,
            password: None,
            timeout: Duration::from_secs(30),
            retries: 2,
            retry_delay: Duration::from_secs(1),
        }
    }
}

pub struct RpcClient {
    client: reqwest::Client,
    config: RpcConfig,
    request_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: &str) -> Result<Self, RpcError> {
        Self::with_config(RpcConfig {
            url: url.trim_end_matches('/').to_string(),
            ..Default::default()
        })
    }

    pub fn with_config(config: RpcConfig) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| RpcError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            config,
            request_id: AtomicU64::new(0),
        })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let (Some(user), Some(pass)) = (&self.config.username, &self.config.password) {
            let creds =
                base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, pass));
            if let Ok(value) = HeaderValue::from_str(&format!("Basic {}", creds)) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    async fn with_retry<F, Fut>(&self, what: &str, mut attempt_fn: F) -> Result<Value, RpcError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Value, RpcError>>,
    {
        let attempts = self.config.retries + 1;
        let mut last_err = RpcError::NoResult(what.to_string());
        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.config.retry_delay * 2u32.saturating_pow(attempt - 1);
                debug!("retrying {} (attempt {}) after {:?}", what, attempt + 1, delay);
                tokio::time::sleep(delay).await;
            }
            match attempt_fn().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && attempt + 1 < attempts => last_err = e,
                Err(e) => return Err(e),
            }
        }
        Err(last_err)
    }

    /// Call a JSON-RPC 2.0 method.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let url = format!("{}/json_rpc", self.config.url);
        self.with_retry(method, || {
            let req = JsonRpcRequest {
                jsonrpc: "2.0",
                id: self.request_id.fetch_add(1, Ordering::Relaxed),
                method,
                params: params.clone(),
            };
            let url = url.clone();
            async move {
                let resp = self
                    .client
                    .post(&url)
                    .headers(self.headers())
                    .json(&req)
                    .send()
                    .await
                    .map_err(|e| RpcError::Http {
                        method: method.to_string(),
                        source: e,
                    })?;

                let status = resp.status().as_u16();
                if status >= 400 {
                    return Err(RpcError::HttpStatus {
                        method: method.to_string(),
                        status,
                    });
                }

                let body: JsonRpcResponse = resp.json().await.map_err(|e| RpcError::Http {
                    method: method.to_string(),
                    source: e,
                })?;

                if let Some(err) = body.error {
                    if err.message == "BUSY" {
                        return Err(RpcError::Busy);
                    }
                    return Err(RpcError::Rpc {
                        method: method.to_string(),
                        code: err.code,
                        message: err.message,
                    });
                }
                body.result.ok_or_else(|| RpcError::NoResult(method.to_string()))
            }
        })
        .await
    }

    /// POST to a raw (non-JSON-RPC) endpoint like `/get_transactions`.
    pub async fn post(&self, endpoint: &str, body: Value) -> Result<Value, RpcError> {
        let url = format!("{}{}", self.config.url, endpoint);
        self.with_retry(endpoint, || {
            let url = url.clone();
            let body = body.clone();
            async move {
                let resp = self
                    .client
                    .post(&url)
                    .headers(self.headers())
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| RpcError::Http {
                        method: endpoint.to_string(),
                        source: e,
                    })?;

                let status = resp.status().as_u16();
                if status >= 400 {
                    return Err(RpcError::HttpStatus {
                        method: endpoint.to_string(),
                        status,
                    });
                }
                resp.json().await.map_err(|e| RpcError::Http {
                    method: endpoint.to_string(),
                    source: e,
                })
            }
        })
        .await
    }
}

/// Reject payloads whose `status` is present and not `OK`.
pub fn require_ok(method: &str, payload: &Value) -> Result<(), RpcError> {
    match payload.get("status").and_then(Value::as_str) {
        None | Some("OK") => Ok(()),
        Some("BUSY") => Err(RpcError::Busy),
        Some(other) => Err(RpcError::BadStatus {
            method: method.to_string(),
            status: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_match_retry_policy() {
        let config = RpcConfig::default();
        assert_eq!(config.retries, 2);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn url_is_normalized() {
        let client = RpcClient::new("http://example.com:19081/").unwrap();
        assert_eq!(client.url(), "http://example.com:19081");
    }

    #[test]
    fn status_discipline() {
        assert!(require_ok("x", &serde_json::json!({ "status": "OK" })).is_ok());
        assert!(require_ok("x", &serde_json::json!({})).is_ok());
        assert!(matches!(
            require_ok("x", &serde_json::json!({ "status": "BUSY" })),
            Err(RpcError::Busy)
        ));
        assert!(matches!(
            require_ok("x", &serde_json::json!({ "status": "Failed" })),
            Err(RpcError::BadStatus { .. })
        ));
    }
}
