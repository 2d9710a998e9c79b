use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed build-time input; raised before any request leaves the process.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The store answered with a bucket/metric shape no decoding path knows.
    #[error("Unsupported aggregation shape for '{name}': {tag}")]
    UnsupportedAggregationShape { name: String, tag: String },

    #[error("Query execution failed: {0}")]
    QueryExecution(#[from] TransportError),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Short machine-readable label, used for metrics and HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::UnsupportedAggregationShape { .. } => "unsupported_aggregation_shape",
            Error::QueryExecution(_) => "query_execution_error",
            Error::Repository(_) => "repository_error",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
        }
    }
}

/// Failure reported by a [`SearchClient`](crate::backends::SearchClient).
///
/// Retries, if any, happen inside the client; by the time one of these
/// reaches the query service it is final.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
