//! RPC error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[cfg(feature = "transport")]
    #[error("HTTP error calling {method}: {source}")]
    Http {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP status {status} from {method}")]
    HttpStatus { method: String, status: u16 },

    #[error("JSON decode error in {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("node returned error {code} for {method}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("node returned status \"{status}\" for {method}")]
    BadStatus { method: String, status: String },

    #[error("no result in response to {0}")]
    NoResult(String),

    #[error("request {0} timed out")]
    Timeout(String),

    #[error("node busy (syncing)")]
    Busy,

    #[error("connection failed: {0}")]
    Connection(String),
}

impl RpcError {
    /// Transient failures are retried by the client's backoff loop.
    pub fn is_transient(&self) -> bool {
        match self {
            #[cfg(feature = "transport")]
            RpcError::Http { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            RpcError::Timeout(_) | RpcError::Busy | RpcError::Connection(_) => true,
            RpcError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
