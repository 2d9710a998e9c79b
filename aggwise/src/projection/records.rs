use super::{scalar_or_zero, FromBucket};
use crate::aggregations::{AggregateValue, Bucket};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Per-customer order count and summed spend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRevenue {
    pub customer: String,
    pub order_count: u64,
    pub total_spent: f64,
}

impl CustomerRevenue {
    pub const TOTAL_SPENT: &'static str = "total_spent";
}

impl FromBucket for CustomerRevenue {
    fn from_bucket(bucket: &Bucket) -> Self {
        Self {
            customer: bucket.key.display_key(),
            order_count: bucket.doc_count,
            total_spent: bucket.metric_or_zero(Self::TOTAL_SPENT),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerOrderStats {
    pub customer: String,
    pub order_count: u64,
    pub avg_order_value: f64,
    pub max_order_value: f64,
}

impl CustomerOrderStats {
    pub const AVG_ORDER_VALUE: &'static str = "avg_order_value";
    pub const MAX_ORDER_VALUE: &'static str = "max_order_value";
}

impl FromBucket for CustomerOrderStats {
    fn from_bucket(bucket: &Bucket) -> Self {
        Self {
            customer: bucket.key.display_key(),
            order_count: bucket.doc_count,
            avg_order_value: bucket.metric_or_zero(Self::AVG_ORDER_VALUE),
            max_order_value: bucket.metric_or_zero(Self::MAX_ORDER_VALUE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub category: String,
    pub order_count: u64,
    pub total_sales: f64,
    pub avg_sales: f64,
    pub max_sale: f64,
}

impl CategoryStats {
    pub const TOTAL_SALES: &'static str = "total_sales";
    pub const AVG_SALES: &'static str = "avg_sales";
    pub const MAX_SALE: &'static str = "max_sale";
}

impl FromBucket for CategoryStats {
    fn from_bucket(bucket: &Bucket) -> Self {
        Self {
            category: bucket.key.display_key(),
            order_count: bucket.doc_count,
            total_sales: bucket.metric_or_zero(Self::TOTAL_SALES),
            avg_sales: bucket.metric_or_zero(Self::AVG_SALES),
            max_sale: bucket.metric_or_zero(Self::MAX_SALE),
        }
    }
}

/// One calendar day of sales
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySalesStats {
    /// `yyyy-MM-dd` when the store formats the key, epoch millis otherwise
    pub date: String,
    pub order_count: u64,
    pub total_sales: f64,
    pub avg_sales: f64,
}

impl DailySalesStats {
    pub const TOTAL_SALES: &'static str = "total_sales";
    pub const AVG_SALES: &'static str = "avg_sales";
}

impl FromBucket for DailySalesStats {
    fn from_bucket(bucket: &Bucket) -> Self {
        Self {
            date: bucket.key.display_key(),
            order_count: bucket.doc_count,
            total_sales: bucket.metric_or_zero(Self::TOTAL_SALES),
            avg_sales: bucket.metric_or_zero(Self::AVG_SALES),
        }
    }
}

/// Smallest and largest value of a field. `None` means no document had one.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MinMax {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl MinMax {
    pub fn from_scalars(min: Option<&AggregateValue>, max: Option<&AggregateValue>) -> Self {
        Self {
            min: min.and_then(AggregateValue::scalar),
            max: max.and_then(AggregateValue::scalar),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueStats {
    pub total_revenue: f64,
    pub average_order_value: f64,
    pub min_order_amount: f64,
    pub max_order_amount: f64,
}

impl RevenueStats {
    pub const TOTAL_REVENUE: &'static str = "total_revenue";
    pub const AVG_ORDER_VALUE: &'static str = "avg_order_value";
    pub const MIN_ORDER_AMOUNT: &'static str = "min_order_amount";
    pub const MAX_ORDER_AMOUNT: &'static str = "max_order_amount";

    /// Unlike [`MinMax`], null min/max collapse to `0.0` here
    pub fn from_scalars(
        sum: Option<&AggregateValue>,
        avg: Option<&AggregateValue>,
        min: Option<&AggregateValue>,
        max: Option<&AggregateValue>,
    ) -> Self {
        Self {
            total_revenue: scalar_or_zero(sum),
            average_order_value: scalar_or_zero(avg),
            min_order_amount: scalar_or_zero(min),
            max_order_amount: scalar_or_zero(max),
        }
    }
}

/// Display key to doc count, in bucket order.
///
/// Serializes as a JSON object whose key order is the bucket order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupCounts(Vec<(String, u64)>);

impl GroupCounts {
    pub fn get(&self, key: &str) -> Option<u64> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, c)| *c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, c)| (k.as_str(), *c))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn total(&self) -> u64 {
        self.0.iter().map(|(_, c)| c).sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<(String, u64)> {
        self.0
    }
}

impl FromIterator<(String, u64)> for GroupCounts {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        GroupCounts(iter.into_iter().collect())
    }
}

impl Serialize for GroupCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, c) in &self.0 {
            map.serialize_entry(k, c)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===================================================================
    // MinMax null handling
    // ===================================================================

    #[test]
    fn test_min_max_preserves_null() {
        let none = AggregateValue::ScalarMetric(None);
        let mm = MinMax::from_scalars(Some(&none), Some(&none));
        assert_eq!(mm, MinMax { min: None, max: None });
        assert!(mm.is_empty());

        let zero = AggregateValue::ScalarMetric(Some(0.0));
        let mm = MinMax::from_scalars(Some(&zero), Some(&zero));
        assert_eq!(
            mm,
            MinMax {
                min: Some(0.0),
                max: Some(0.0)
            }
        );
        assert_ne!(mm, MinMax::default());
    }

    #[test]
    fn test_min_max_serializes_null() {
        let json = serde_json::to_value(MinMax::default()).unwrap();
        assert!(json["min"].is_null());
        assert!(json["max"].is_null());
    }

    #[test]
    fn test_revenue_stats_defaults_to_zero() {
        let none = AggregateValue::ScalarMetric(None);
        let stats = RevenueStats::from_scalars(None, Some(&none), Some(&none), None);
        assert_eq!(stats, RevenueStats::default());
    }

    // ===================================================================
    // GroupCounts
    // ===================================================================

    #[test]
    fn test_group_counts_keeps_order_in_json() {
        let counts: GroupCounts = vec![("PAID".to_string(), 5), ("CANCELLED".to_string(), 2)]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&counts).unwrap();
        assert_eq!(json, r#"{"PAID":5,"CANCELLED":2}"#);
        assert_eq!(counts.get("CANCELLED"), Some(2));
        assert_eq!(counts.total(), 7);
    }

    #[test]
    fn test_dto_field_names_are_camel_case() {
        let row = CustomerRevenue {
            customer: "A".to_string(),
            order_count: 2,
            total_spent: 150.0,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["orderCount"], 2);
        assert_eq!(json["totalSpent"], 150.0);
    }
}
