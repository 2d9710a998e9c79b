use crate::error::TransportError;
use crate::query::QueryRequest;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// A returned document hit
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: String,
    pub source: Value,
}

/// What the store sent back for one query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResponse {
    /// Total documents matched by the (filtered) query
    pub total_hits: u64,
    pub hits: Vec<Hit>,
    /// `None` when the store reported no aggregation section at all
    pub aggregations: Option<HashMap<String, RawAggregate>>,
}

impl RawResponse {
    pub fn aggregation(&self, name: &str) -> Option<&RawAggregate> {
        self.aggregations.as_ref().and_then(|aggs| aggs.get(name))
    }
}

/// Tagged union of aggregation results as the store reports them.
///
/// The tag is decided by the store (for terms it depends on the storage type
/// of the grouped field), never by the request.
#[derive(Debug, Clone, PartialEq)]
pub enum RawAggregate {
    Sum { value: Option<f64> },
    Avg { value: Option<f64> },
    Min { value: Option<f64> },
    Max { value: Option<f64> },
    ValueCount { value: Option<f64> },
    StringTerms { buckets: Vec<RawBucket<String>> },
    NumericTerms { buckets: Vec<RawBucket<i64>> },
    CompositeTerms { buckets: Vec<RawBucket<Vec<KeyPart>>> },
    /// Keys are epoch milliseconds of the interval start
    DateHistogram { buckets: Vec<RawBucket<i64>> },
    Unknown { tag: String },
}

impl RawAggregate {
    pub fn tag(&self) -> &str {
        match self {
            RawAggregate::Sum { .. } => "sum",
            RawAggregate::Avg { .. } => "avg",
            RawAggregate::Min { .. } => "min",
            RawAggregate::Max { .. } => "max",
            RawAggregate::ValueCount { .. } => "valueCount",
            RawAggregate::StringTerms { .. } => "stringTerms",
            RawAggregate::NumericTerms { .. } => "numericTerms",
            RawAggregate::CompositeTerms { .. } => "compositeTerms",
            RawAggregate::DateHistogram { .. } => "dateHistogram",
            RawAggregate::Unknown { tag } => tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawBucket<K> {
    pub key: K,
    pub key_as_string: Option<String>,
    pub doc_count: u64,
    pub aggregations: HashMap<String, RawAggregate>,
}

impl<K> RawBucket<K> {
    pub fn new(key: K, doc_count: u64) -> Self {
        Self {
            key,
            key_as_string: None,
            doc_count,
            aggregations: HashMap::new(),
        }
    }

    pub fn with_sub(mut self, name: impl Into<String>, agg: RawAggregate) -> Self {
        self.aggregations.insert(name.into(), agg);
        self
    }
}

/// One component of a multi-field bucket key
#[derive(Debug, Clone, PartialEq)]
pub enum KeyPart {
    Str(String),
    Long(i64),
    Double(f64),
    Bool(bool),
}

/// The search engine client. Owns transport, pooling and retries.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn execute(&self, request: &QueryRequest) -> Result<RawResponse, TransportError>;
}

/// Keyed single-document persistence
#[async_trait]
pub trait DocumentRepository<D>: Send + Sync
where
    D: Send + Sync + 'static,
{
    /// Insert or replace by id
    async fn save(&self, doc: D) -> crate::Result<D>;

    /// Exact-match lookup on one field
    async fn find_by_field(&self, field: &str, value: &str) -> crate::Result<Vec<D>>;
}
