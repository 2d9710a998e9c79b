//! Elasticsearch Query DSL types
//!
//! The subset of the search request body that aggwise emits. Every optional
//! field is skipped when unset so the serialized body stays minimal.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Root ES search request body
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EsSearchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<EsQuery>,

    /// Starting offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<usize>,

    /// Number of hits to return; 0 for aggregation-only requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggs: Option<BTreeMap<String, EsAggregation>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<SortClause>>,

    /// Count every match instead of stopping at 10k
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_total_hits: Option<bool>,
}

/// `{"<field>": {"order": "asc"}}`
pub type SortClause = BTreeMap<String, SortSpec>;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SortSpec {
    pub order: String,
}

/// ES Query types
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EsQuery {
    /// Match all documents
    MatchAll(MatchAllQuery),

    /// Match query (analyzed full-text)
    Match(BTreeMap<String, MatchQuery>),

    /// Term query (exact match, not analyzed)
    Term(BTreeMap<String, TermQuery>),

    /// Range query
    Range(BTreeMap<String, RangeParams>),

    /// Bool query (must, should, must_not, filter)
    Bool(BoolQuery),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MatchAllQuery {}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MatchQuery {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TermQuery {
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RangeParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct BoolQuery {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<EsQuery>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub should: Vec<EsQuery>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must_not: Vec<EsQuery>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<EsQuery>,
}

// ============================================================================
// Aggregations
// ============================================================================

/// One named aggregation. Exactly one of the kind fields is set.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EsAggregation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum: Option<FieldAgg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg: Option<FieldAgg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<FieldAgg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<FieldAgg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_count: Option<FieldAgg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms: Option<TermsAgg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_terms: Option<MultiTermsAgg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_histogram: Option<DateHistogramAgg>,

    /// Sub-aggregations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggs: Option<BTreeMap<String, EsAggregation>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FieldAgg {
    pub field: String,
}

impl FieldAgg {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TermsAgg {
    pub field: String,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MultiTermsAgg {
    pub terms: Vec<FieldAgg>,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DateHistogramAgg {
    pub field: String,
    pub calendar_interval: String,
    /// Format of `key_as_string`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_doc_count: Option<u64>,
}
