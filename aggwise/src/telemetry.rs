//! Query telemetry
//!
//! Prometheus-compatible metrics for the query layer:
//! - Query duration per operation
//! - Query outcomes (ok/error)
//! - Decoder fallbacks (soft-decoded aggregations)

use std::time::Duration;

/// Why the decoder substituted a default for a requested aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    MissingAggregation,
    MissingSubAggregation,
    KindMismatch,
    UnsupportedShape,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::MissingAggregation => "missing_aggregation",
            FallbackReason::MissingSubAggregation => "missing_sub_aggregation",
            FallbackReason::KindMismatch => "kind_mismatch",
            FallbackReason::UnsupportedShape => "unsupported_shape",
        }
    }
}

/// Record query round-trip duration
pub fn record_query_duration(operation: &str, duration: Duration) {
    metrics::histogram!(
        "aggwise_query_duration_seconds",
        "operation" => operation.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Record a successful query
pub fn record_query_success(operation: &str) {
    metrics::counter!(
        "aggwise_queries_total",
        "operation" => operation.to_string(),
        "status" => "ok",
    )
    .increment(1);
}

/// Record a failed query
pub fn record_query_error(operation: &str, error_type: &str) {
    metrics::counter!(
        "aggwise_queries_total",
        "operation" => operation.to_string(),
        "status" => "error",
    )
    .increment(1);

    metrics::counter!(
        "aggwise_query_errors_total",
        "operation" => operation.to_string(),
        "error_type" => error_type.to_string(),
    )
    .increment(1);
}

/// Record a soft-decode fallback
pub fn record_decode_fallback(reason: FallbackReason) {
    metrics::counter!(
        "aggwise_decode_fallbacks_total",
        "reason" => reason.as_str(),
    )
    .increment(1);
}
