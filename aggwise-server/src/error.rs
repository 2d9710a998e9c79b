//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Handler error: wraps a core error and renders it as JSON
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] aggwise::Error);

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
    status: u16,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    error_type: &'static str,
    reason: String,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            aggwise::Error::Validation(_) => StatusCode::BAD_REQUEST,
            aggwise::Error::QueryExecution(_) | aggwise::Error::UnsupportedAggregationShape { .. } => {
                StatusCode::BAD_GATEWAY
            }
            aggwise::Error::Repository(_) | aggwise::Error::Io(_) | aggwise::Error::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        let body = ErrorResponse {
            error: ErrorDetail {
                error_type: self.0.kind(),
                reason: self.0.to_string(),
            },
            status: status.as_u16(),
        };
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggwise::TransportError;

    #[test]
    fn test_status_codes() {
        let err = ApiError::from(aggwise::Error::validation("bad size"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = ApiError::from(aggwise::Error::QueryExecution(TransportError::Timeout(5)));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);

        let err = ApiError::from(aggwise::Error::Repository("down".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
