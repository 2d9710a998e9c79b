//! Result projection
//!
//! Flattens decoded aggregations into caller-facing records. Every requested
//! metric is read through [`Bucket::metric_or_zero`], so a null or absent
//! sub-aggregate becomes `0.0` in the record. [`MinMax`] is the exception and
//! keeps `None` for "no data".

mod records;

pub use records::{
    CategoryStats, CustomerOrderStats, CustomerRevenue, DailySalesStats, GroupCounts, MinMax,
    RevenueStats,
};

use crate::aggregations::{AggregateValue, Bucket};

/// Builds one record from one decoded bucket
pub trait FromBucket: Sized {
    fn from_bucket(bucket: &Bucket) -> Self;
}

/// Project every bucket of `value`, in bucket order.
///
/// A scalar value projects to an empty sequence.
pub fn project_buckets<T: FromBucket>(value: &AggregateValue) -> Vec<T> {
    value.buckets().iter().map(T::from_bucket).collect()
}

/// `(display key, doc count)` of every bucket, in bucket order
pub fn group_counts(value: &AggregateValue) -> GroupCounts {
    value
        .buckets()
        .iter()
        .map(|b| (b.key.display_key(), b.doc_count))
        .collect()
}

/// Scalar value of a metric, `0.0` when null
pub fn scalar_or_zero(value: Option<&AggregateValue>) -> f64 {
    value.and_then(AggregateValue::scalar).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregations::BucketKey;
    use std::collections::BTreeMap;

    fn bucket(key: &str, doc_count: u64, metrics: &[(&str, Option<f64>)]) -> Bucket {
        Bucket {
            key: BucketKey::String(key.to_string()),
            doc_count,
            sub_aggregates: metrics
                .iter()
                .map(|(n, v)| (n.to_string(), AggregateValue::ScalarMetric(*v)))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_project_customer_revenue() {
        let value = AggregateValue::BucketSet(vec![
            bucket("A", 2, &[("total_spent", Some(150.0))]),
            bucket("C", 1, &[("total_spent", None)]),
        ]);
        let rows: Vec<CustomerRevenue> = project_buckets(&value);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].customer, "A");
        assert_eq!(rows[0].order_count, 2);
        assert_eq!(rows[0].total_spent, 150.0);
        assert_eq!(rows[1].total_spent, 0.0);
    }

    #[test]
    fn test_absent_metric_projects_to_zero() {
        let value = AggregateValue::BucketSet(vec![bucket(
            "books",
            3,
            &[("total_sales", Some(90.0)), ("avg_sales", Some(30.0))],
        )]);
        let rows: Vec<CategoryStats> = project_buckets(&value);
        assert_eq!(rows[0].category, "books");
        assert_eq!(rows[0].avg_sales, 30.0);
        assert_eq!(rows[0].max_sale, 0.0);
    }

    #[test]
    fn test_scalar_projects_to_no_rows() {
        let value = AggregateValue::ScalarMetric(Some(3.0));
        let rows: Vec<CategoryStats> = project_buckets(&value);
        assert!(rows.is_empty());
        assert!(group_counts(&value).is_empty());
    }

    #[test]
    fn test_scalar_or_zero() {
        assert_eq!(scalar_or_zero(None), 0.0);
        assert_eq!(scalar_or_zero(Some(&AggregateValue::ScalarMetric(None))), 0.0);
        assert_eq!(
            scalar_or_zero(Some(&AggregateValue::ScalarMetric(Some(2.5)))),
            2.5
        );
    }
}
