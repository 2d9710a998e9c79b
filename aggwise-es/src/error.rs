//! Elasticsearch client errors

use aggwise::TransportError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EsError {
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Elasticsearch returned {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EsError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        EsError::MalformedResponse(msg.into())
    }

    /// Classify a reqwest failure; `timeout_ms` is the client's configured limit
    pub fn from_request(err: reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            EsError::Timeout(timeout_ms)
        } else if err.is_connect() {
            EsError::Connection(err.to_string())
        } else if err.is_decode() {
            EsError::MalformedResponse(err.to_string())
        } else {
            EsError::Http(err)
        }
    }

    /// Build a status error from an ES error body, preferring its `reason`
    pub fn from_status(status: u16, body: &str) -> Self {
        let reason = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/reason")
                    .and_then(|r| r.as_str())
                    .map(String::from)
            })
            .unwrap_or_else(|| body.to_string());
        EsError::Status { status, reason }
    }
}

impl From<EsError> for TransportError {
    fn from(err: EsError) -> Self {
        match err {
            EsError::Timeout(ms) => TransportError::Timeout(ms),
            EsError::Connection(msg) | EsError::InvalidUrl(msg) => {
                TransportError::Connection(msg)
            }
            EsError::Http(e) => TransportError::Connection(e.to_string()),
            EsError::Status { status, reason } => TransportError::Status {
                status,
                body: reason,
            },
            EsError::MalformedResponse(msg) => TransportError::MalformedResponse(msg),
            EsError::Json(e) => TransportError::MalformedResponse(e.to_string()),
        }
    }
}
