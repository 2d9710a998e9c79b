use crate::aggregations::{AggregationNode, AggregationSet};
use crate::error::{Error, Result};
use crate::query::filter::FilterExpression;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortField {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }
}

/// Zero-based page of hits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub number: usize,
    pub size: usize,
}

impl Page {
    pub fn offset(&self) -> usize {
        self.number.saturating_mul(self.size)
    }
}

/// One query: optional filter, named aggregations, hit controls.
///
/// Handed as-is to a [`SearchClient`](crate::backends::SearchClient).
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub filter: Option<FilterExpression>,
    pub aggregations: AggregationSet,
    /// 0 suppresses document hits
    pub max_hits: usize,
    pub sort: Vec<SortField>,
    /// Takes precedence over `max_hits` when set
    pub page: Option<Page>,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            filter: None,
            aggregations: AggregationSet::new(),
            max_hits: 10,
            sort: Vec::new(),
            page: None,
        }
    }
}

impl QueryRequest {
    pub fn builder() -> QueryRequestBuilder {
        QueryRequestBuilder::default()
    }

    /// Filter to evaluate; `MatchAll` when none was given
    pub fn effective_filter(&self) -> FilterExpression {
        self.filter.clone().unwrap_or(FilterExpression::MatchAll)
    }

    /// `(offset, limit)` for hit paging
    pub fn hit_window(&self) -> (usize, usize) {
        match self.page {
            Some(page) => (page.offset(), page.size),
            None => (0, self.max_hits),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryRequestBuilder {
    request: QueryRequest,
    errors: Vec<String>,
}

impl QueryRequestBuilder {
    pub fn filter(mut self, filter: FilterExpression) -> Self {
        self.request.filter = Some(filter);
        self
    }

    pub fn aggregation(mut self, name: impl Into<String>, node: AggregationNode) -> Self {
        if let Err(e) = self.request.aggregations.insert(name, node) {
            self.errors.push(e.to_string());
        }
        self
    }

    pub fn aggregations(mut self, aggs: AggregationSet) -> Self {
        self.request.aggregations = aggs;
        self
    }

    pub fn max_hits(mut self, max_hits: usize) -> Self {
        self.request.max_hits = max_hits;
        self
    }

    /// Aggregation-only request
    pub fn no_hits(self) -> Self {
        self.max_hits(0)
    }

    pub fn sort(mut self, sort: SortField) -> Self {
        self.request.sort.push(sort);
        self
    }

    pub fn page(mut self, number: usize, size: usize) -> Self {
        if size == 0 {
            self.errors.push("page size must be a positive integer".to_string());
        }
        self.request.page = Some(Page { number, size });
        self
    }

    pub fn build(self) -> Result<QueryRequest> {
        if !self.errors.is_empty() {
            return Err(Error::Validation(self.errors.join("; ")));
        }
        Ok(self.request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::filter::term;

    #[test]
    fn test_builder_collects_aggregations() {
        let req = QueryRequest::builder()
            .filter(term("status", "PAID").unwrap())
            .aggregation("paid_revenue", AggregationNode::sum("total_amount").unwrap())
            .no_hits()
            .build()
            .unwrap();

        assert_eq!(req.max_hits, 0);
        assert_eq!(req.aggregations.len(), 1);
        assert!(req.filter.is_some());
    }

    #[test]
    fn test_builder_rejects_duplicate_names() {
        let err = QueryRequest::builder()
            .aggregation("x", AggregationNode::sum("a").unwrap())
            .aggregation("x", AggregationNode::avg("a").unwrap())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_hit_window_page_precedence() {
        let req = QueryRequest::builder().max_hits(50).page(2, 10).build().unwrap();
        assert_eq!(req.hit_window(), (20, 10));

        let req = QueryRequest::builder().max_hits(50).build().unwrap();
        assert_eq!(req.hit_window(), (0, 50));
    }

    #[test]
    fn test_effective_filter_defaults_to_match_all() {
        let req = QueryRequest::default();
        assert_eq!(req.effective_filter(), FilterExpression::MatchAll);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        assert!(QueryRequest::builder().page(0, 0).build().is_err());
    }
}
