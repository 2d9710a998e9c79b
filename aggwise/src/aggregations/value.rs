use crate::aggregations::types::AggregationNode;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Separator used when flattening multi-field keys into one display key.
/// The join is one-way; display keys are not parsed back.
pub const COMPOSITE_KEY_SEPARATOR: &str = "|";

/// Decoded aggregation result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AggregateValue {
    /// `None` when the store had no value (for example min over zero documents)
    ScalarMetric(Option<f64>),
    BucketSet(Vec<Bucket>),
}

impl AggregateValue {
    /// What a requested aggregation decodes to when the response lacks it
    pub fn missing(node: &AggregationNode) -> Self {
        if node.is_bucket() {
            AggregateValue::BucketSet(Vec::new())
        } else {
            AggregateValue::ScalarMetric(None)
        }
    }

    /// What a requested sub-aggregation decodes to when a bucket lacks it
    pub fn zero(node: &AggregationNode) -> Self {
        if node.is_bucket() {
            AggregateValue::BucketSet(Vec::new())
        } else {
            AggregateValue::ScalarMetric(Some(0.0))
        }
    }

    pub fn scalar(&self) -> Option<f64> {
        match self {
            AggregateValue::ScalarMetric(v) => *v,
            AggregateValue::BucketSet(_) => None,
        }
    }

    pub fn buckets(&self) -> &[Bucket] {
        match self {
            AggregateValue::BucketSet(buckets) => buckets,
            AggregateValue::ScalarMetric(_) => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub key: BucketKey,
    pub doc_count: u64,
    /// One entry per requested sub-aggregation, present even when the store
    /// omitted it
    pub sub_aggregates: BTreeMap<String, AggregateValue>,
}

impl Bucket {
    pub fn sub(&self, name: &str) -> Option<&AggregateValue> {
        self.sub_aggregates.get(name)
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.sub(name).and_then(AggregateValue::scalar)
    }

    pub fn metric_or_zero(&self, name: &str) -> f64 {
        self.metric(name).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum BucketKey {
    String(String),
    Numeric(i64),
    Composite(Vec<String>),
}

impl BucketKey {
    pub fn display_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketKey::String(s) => f.write_str(s),
            BucketKey::Numeric(n) => write!(f, "{n}"),
            BucketKey::Composite(parts) => f.write_str(&parts.join(COMPOSITE_KEY_SEPARATOR)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_display_key() {
        let key = BucketKey::Composite(vec!["east".to_string(), "gold".to_string()]);
        assert_eq!(key.display_key(), "east|gold");
    }

    #[test]
    fn test_numeric_display_key() {
        assert_eq!(BucketKey::Numeric(-42).display_key(), "-42");
    }

    #[test]
    fn test_missing_vs_zero() {
        let metric = AggregationNode::min("total_amount").unwrap();
        assert_eq!(AggregateValue::missing(&metric), AggregateValue::ScalarMetric(None));
        assert_eq!(AggregateValue::zero(&metric), AggregateValue::ScalarMetric(Some(0.0)));

        let terms = AggregationNode::terms("customer", 3).unwrap();
        assert!(AggregateValue::missing(&terms).buckets().is_empty());
        assert!(AggregateValue::zero(&terms).buckets().is_empty());
    }
}
