//! Query orchestration
//!
//! [`QueryService`] runs one [`QueryRequest`] through the injected
//! [`SearchClient`] and decodes what comes back. It adds timing, logging and
//! metrics but no retries: a client failure surfaces as
//! [`Error::QueryExecution`] carrying the client's own error.

pub mod orders;

pub use orders::OrderAnalytics;

use crate::aggregations::{AggregationDecoder, DecodedAggregations};
use crate::backends::{RawResponse, SearchClient};
use crate::error::{Error, Result};
use crate::query::QueryRequest;
use crate::telemetry;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct QueryService {
    client: Arc<dyn SearchClient>,
}

impl QueryService {
    pub fn new(client: Arc<dyn SearchClient>) -> Self {
        Self { client }
    }

    /// Execute `request` once and return the raw response
    pub async fn execute(&self, operation: &str, request: &QueryRequest) -> Result<RawResponse> {
        let start = Instant::now();
        let result = self.client.execute(request).await;
        let elapsed = start.elapsed();
        telemetry::record_query_duration(operation, elapsed);

        match result {
            Ok(response) => {
                telemetry::record_query_success(operation);
                debug!(
                    operation,
                    aggregations = ?request.aggregations.names().collect::<Vec<_>>(),
                    total_hits = response.total_hits,
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    "Query executed"
                );
                Ok(response)
            }
            Err(e) => {
                let err = Error::QueryExecution(e);
                telemetry::record_query_error(operation, err.kind());
                warn!(operation, "Query failed: {}", err);
                Err(err)
            }
        }
    }

    /// Execute `request` and decode every aggregation it names
    pub async fn aggregate(
        &self,
        operation: &str,
        request: &QueryRequest,
    ) -> Result<DecodedAggregations> {
        let response = self.execute(operation, request).await?;
        Ok(AggregationDecoder::decode_all(&response, &request.aggregations))
    }
}

impl std::fmt::Debug for QueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryService").finish_non_exhaustive()
    }
}
