//! Aggregation response decoding
//!
//! Walks the store's tagged aggregation union using the requested
//! [`AggregationNode`] as the expected shape. The bucket key encoding is taken
//! from the response tag, never from the request.
//!
//! Decoding is soft: shape mismatches and absent aggregations turn into
//! defaults instead of errors. Only [`AggregationDecoder::decode`] reports
//! [`Error::UnsupportedAggregationShape`]; everything built on top of it
//! swallows that into an empty result.

use crate::aggregations::types::{AggregationNode, AggregationSet, MetricKind};
use crate::aggregations::value::{AggregateValue, Bucket, BucketKey};
use crate::backends::{KeyPart, RawAggregate, RawBucket, RawResponse};
use crate::error::{Error, Result};
use crate::telemetry::{self, FallbackReason};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Decoded top-level aggregations of one response, keyed by request name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedAggregations {
    values: BTreeMap<String, AggregateValue>,
}

impl DecodedAggregations {
    pub fn get(&self, name: &str) -> Option<&AggregateValue> {
        self.values.get(name)
    }

    /// Scalar value of a metric aggregation; `None` if absent or null
    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(AggregateValue::scalar)
    }

    /// Buckets of a bucket aggregation; empty if absent
    pub fn buckets(&self, name: &str) -> &[Bucket] {
        self.get(name).map(AggregateValue::buckets).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub struct AggregationDecoder;

impl AggregationDecoder {
    /// Decode every requested aggregation. Always yields one entry per name
    /// in `requested`.
    pub fn decode_all(response: &RawResponse, requested: &AggregationSet) -> DecodedAggregations {
        if response.aggregations.is_none() && !requested.is_empty() {
            debug!("Response carries no aggregation section");
        }

        let values = requested
            .iter()
            .map(|(name, node)| {
                let value = Self::decode_soft(name, node, response.aggregation(name));
                (name.to_string(), value)
            })
            .collect();

        DecodedAggregations { values }
    }

    /// Decode one aggregation, recovering from an unsupported shape with an
    /// empty result.
    pub fn decode_soft(
        name: &str,
        node: &AggregationNode,
        raw: Option<&RawAggregate>,
    ) -> AggregateValue {
        match Self::decode(name, node, raw) {
            Ok(value) => value,
            Err(e) => {
                warn!("Falling back to empty result for aggregation '{}': {}", name, e);
                telemetry::record_decode_fallback(FallbackReason::UnsupportedShape);
                AggregateValue::missing(node)
            }
        }
    }

    /// Decode one aggregation.
    ///
    /// Fails only when a bucket aggregation comes back with a tag that no
    /// bucket decoding path handles.
    pub fn decode(
        name: &str,
        node: &AggregationNode,
        raw: Option<&RawAggregate>,
    ) -> Result<AggregateValue> {
        let Some(raw) = raw else {
            debug!("Aggregation '{}' absent from response", name);
            telemetry::record_decode_fallback(FallbackReason::MissingAggregation);
            return Ok(AggregateValue::missing(node));
        };

        match node {
            AggregationNode::Metric { kind, .. } => Ok(Self::decode_metric(name, *kind, raw)),
            AggregationNode::Terms { aggs, .. }
            | AggregationNode::MultiTerms { aggs, .. }
            | AggregationNode::DateHistogram { aggs, .. } => {
                let mut buckets = Self::decode_buckets(name, raw, aggs)?;
                if let Some(limit) = node.bucket_limit() {
                    if buckets.len() > limit {
                        debug!(
                            "Aggregation '{}' returned {} buckets, keeping the first {}",
                            name,
                            buckets.len(),
                            limit
                        );
                        buckets.truncate(limit);
                    }
                }
                Ok(AggregateValue::BucketSet(buckets))
            }
        }
    }

    fn decode_metric(name: &str, kind: MetricKind, raw: &RawAggregate) -> AggregateValue {
        let value = match (kind, raw) {
            (MetricKind::Sum, RawAggregate::Sum { value })
            | (MetricKind::Avg, RawAggregate::Avg { value })
            | (MetricKind::Min, RawAggregate::Min { value })
            | (MetricKind::Max, RawAggregate::Max { value })
            | (MetricKind::ValueCount, RawAggregate::ValueCount { value }) => *value,
            (kind, raw) => {
                debug!(
                    "Aggregation '{}' requested as {} but store returned {}",
                    name,
                    kind.as_str(),
                    raw.tag()
                );
                telemetry::record_decode_fallback(FallbackReason::KindMismatch);
                None
            }
        };
        AggregateValue::ScalarMetric(value)
    }

    fn decode_buckets(
        name: &str,
        raw: &RawAggregate,
        requested: &AggregationSet,
    ) -> Result<Vec<Bucket>> {
        let buckets = match raw {
            RawAggregate::StringTerms { buckets } => buckets
                .iter()
                .map(|b| Self::bucket(BucketKey::String(b.key.clone()), b, requested))
                .collect(),
            RawAggregate::NumericTerms { buckets } => buckets
                .iter()
                .map(|b| Self::bucket(BucketKey::Numeric(b.key), b, requested))
                .collect(),
            RawAggregate::CompositeTerms { buckets } => buckets
                .iter()
                .map(|b| {
                    let parts = b.key.iter().map(key_part_to_string).collect();
                    Self::bucket(BucketKey::Composite(parts), b, requested)
                })
                .collect(),
            RawAggregate::DateHistogram { buckets } => buckets
                .iter()
                .map(|b| {
                    let key = match &b.key_as_string {
                        Some(s) => BucketKey::String(s.clone()),
                        None => BucketKey::Numeric(b.key),
                    };
                    Self::bucket(key, b, requested)
                })
                .collect(),
            other => {
                return Err(Error::UnsupportedAggregationShape {
                    name: name.to_string(),
                    tag: other.tag().to_string(),
                })
            }
        };
        Ok(buckets)
    }

    fn bucket<K>(key: BucketKey, raw: &RawBucket<K>, requested: &AggregationSet) -> Bucket {
        Bucket {
            key,
            doc_count: raw.doc_count,
            sub_aggregates: Self::decode_subs(&raw.aggregations, requested),
        }
    }

    fn decode_subs(
        raw: &HashMap<String, RawAggregate>,
        requested: &AggregationSet,
    ) -> BTreeMap<String, AggregateValue> {
        requested
            .iter()
            .map(|(name, node)| {
                let value = match raw.get(name) {
                    Some(sub) => Self::decode_soft(name, node, Some(sub)),
                    None => {
                        telemetry::record_decode_fallback(FallbackReason::MissingSubAggregation);
                        AggregateValue::zero(node)
                    }
                };
                (name.to_string(), value)
            })
            .collect()
    }
}

fn key_part_to_string(part: &KeyPart) -> String {
    match part {
        KeyPart::Str(s) => s.clone(),
        KeyPart::Long(n) => n.to_string(),
        KeyPart::Double(d) => d.to_string(),
        KeyPart::Bool(b) => b.to_string(),
    }
}
