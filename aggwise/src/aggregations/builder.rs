use crate::aggregations::types::{AggregationNode, AggregationSet, CalendarInterval, MetricKind};
use crate::error::{Error, Result};

fn check_field(field: &str) -> Result<()> {
    if field.trim().is_empty() {
        return Err(Error::validation("aggregation field must not be empty"));
    }
    Ok(())
}

fn check_size(size: usize) -> Result<()> {
    if size == 0 {
        return Err(Error::validation("bucket size must be a positive integer"));
    }
    Ok(())
}

impl AggregationNode {
    pub fn metric(kind: MetricKind, field: impl Into<String>) -> Result<AggregationNode> {
        let field = field.into();
        check_field(&field)?;
        Ok(AggregationNode::Metric { kind, field })
    }

    pub fn sum(field: impl Into<String>) -> Result<AggregationNode> {
        Self::metric(MetricKind::Sum, field)
    }

    pub fn avg(field: impl Into<String>) -> Result<AggregationNode> {
        Self::metric(MetricKind::Avg, field)
    }

    pub fn min(field: impl Into<String>) -> Result<AggregationNode> {
        Self::metric(MetricKind::Min, field)
    }

    pub fn max(field: impl Into<String>) -> Result<AggregationNode> {
        Self::metric(MetricKind::Max, field)
    }

    pub fn value_count(field: impl Into<String>) -> Result<AggregationNode> {
        Self::metric(MetricKind::ValueCount, field)
    }

    pub fn terms(field: impl Into<String>, size: usize) -> Result<AggregationNode> {
        Self::terms_with(field, size, AggregationSet::new())
    }

    pub fn terms_with(
        field: impl Into<String>,
        size: usize,
        aggs: AggregationSet,
    ) -> Result<AggregationNode> {
        let field = field.into();
        check_field(&field)?;
        check_size(size)?;
        Ok(AggregationNode::Terms { field, size, aggs })
    }

    pub fn multi_terms<F: Into<String>>(
        fields: impl IntoIterator<Item = F>,
        size: usize,
    ) -> Result<AggregationNode> {
        Self::multi_terms_with(fields, size, AggregationSet::new())
    }

    pub fn multi_terms_with<F: Into<String>>(
        fields: impl IntoIterator<Item = F>,
        size: usize,
        aggs: AggregationSet,
    ) -> Result<AggregationNode> {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.len() < 2 {
            return Err(Error::validation(
                "multi-field grouping needs at least two fields",
            ));
        }
        for field in &fields {
            check_field(field)?;
        }
        check_size(size)?;
        Ok(AggregationNode::MultiTerms { fields, size, aggs })
    }

    pub fn date_histogram(
        field: impl Into<String>,
        interval: CalendarInterval,
    ) -> Result<AggregationNode> {
        Self::date_histogram_with(field, interval, AggregationSet::new())
    }

    pub fn date_histogram_with(
        field: impl Into<String>,
        interval: CalendarInterval,
        aggs: AggregationSet,
    ) -> Result<AggregationNode> {
        let field = field.into();
        check_field(&field)?;
        Ok(AggregationNode::DateHistogram {
            field,
            interval,
            aggs,
        })
    }

    /// Attach one more named child to a bucket node
    pub fn with_sub_aggregation(
        mut self,
        name: impl Into<String>,
        node: AggregationNode,
    ) -> Result<AggregationNode> {
        match &mut self {
            AggregationNode::Metric { .. } => Err(Error::validation(
                "metric aggregations cannot carry sub-aggregations",
            )),
            AggregationNode::Terms { aggs, .. }
            | AggregationNode::MultiTerms { aggs, .. }
            | AggregationNode::DateHistogram { aggs, .. } => {
                aggs.insert(name, node)?;
                Ok(self)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terms_rejects_zero_size() {
        let err = AggregationNode::terms("customer", 0).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_terms_with_sub_aggregations() {
        let node = AggregationNode::terms("customer", 5)
            .unwrap()
            .with_sub_aggregation("total_spent", AggregationNode::sum("total_amount").unwrap())
            .unwrap();

        let subs = node.sub_aggregations().unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(
            subs.get("total_spent").unwrap().metric_kind(),
            Some(MetricKind::Sum)
        );
        assert_eq!(node.bucket_limit(), Some(5));
    }

    #[test]
    fn test_duplicate_sibling_names_rejected() {
        let err = AggregationNode::terms("customer", 5)
            .unwrap()
            .with_sub_aggregation("stat", AggregationNode::avg("total_amount").unwrap())
            .unwrap()
            .with_sub_aggregation("stat", AggregationNode::max("total_amount").unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(msg) if msg.contains("stat")));

        let err = AggregationSet::from_entries([
            ("a", AggregationNode::sum("x").unwrap()),
            ("a", AggregationNode::sum("y").unwrap()),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_metric_cannot_take_children() {
        let err = AggregationNode::sum("total_amount")
            .unwrap()
            .with_sub_aggregation("x", AggregationNode::avg("total_amount").unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_multi_terms_needs_two_fields() {
        assert!(AggregationNode::multi_terms(["region"], 10).is_err());
        let node = AggregationNode::multi_terms(["region", "tier"], 10).unwrap();
        match node {
            AggregationNode::MultiTerms { fields, size, .. } => {
                assert_eq!(fields, vec!["region", "tier"]);
                assert_eq!(size, 10);
            }
            _ => panic!("Expected MultiTerms"),
        }
    }

    #[test]
    fn test_date_histogram_builder() {
        let node = AggregationNode::date_histogram("order_date", CalendarInterval::Day).unwrap();
        assert!(node.is_bucket());
        assert!(node.bucket_limit().is_none());
        assert!(node.sub_aggregations().unwrap().is_empty());
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(CalendarInterval::parse_interval("DAY"), Some(CalendarInterval::Day));
        assert_eq!(CalendarInterval::parse_interval("1M"), Some(CalendarInterval::Month));
        assert_eq!(CalendarInterval::parse_interval("fortnight"), None);
    }
}
