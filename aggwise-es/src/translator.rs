//! Request translator from aggwise query requests to Elasticsearch Query DSL
//!
//! Requests reach this point already validated by their builders, so
//! translation cannot fail.

use crate::dsl::*;
use aggwise::aggregations::{AggregationNode, AggregationSet, CalendarInterval, MetricKind};
use aggwise::query::{BoolFilter, FilterExpression, QueryRequest, RangeBound, TermValue};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// `key_as_string` format for day and coarser histograms
const DATE_FORMAT: &str = "yyyy-MM-dd";
const HOUR_FORMAT: &str = "yyyy-MM-dd'T'HH:00:00";

/// Translates aggwise requests into ES search bodies
pub struct RequestTranslator;

impl RequestTranslator {
    /// Translate a full request: query, hit window, sort and aggregations
    pub fn translate(request: &QueryRequest) -> EsSearchRequest {
        let (offset, size) = request.hit_window();

        let sort = if request.sort.is_empty() {
            None
        } else {
            Some(
                request
                    .sort
                    .iter()
                    .map(|s| {
                        let mut clause = SortClause::new();
                        clause.insert(
                            s.field.clone(),
                            SortSpec {
                                order: s.order.as_str().to_string(),
                            },
                        );
                        clause
                    })
                    .collect(),
            )
        };

        let aggs = if request.aggregations.is_empty() {
            None
        } else {
            Some(Self::translate_aggregations(&request.aggregations))
        };

        EsSearchRequest {
            query: Some(Self::translate_filter(&request.effective_filter())),
            from: (offset > 0).then_some(offset),
            size: Some(size),
            aggs,
            sort,
            track_total_hits: Some(true),
        }
    }

    /// Translate a filter tree to an ES query
    pub fn translate_filter(filter: &FilterExpression) -> EsQuery {
        match filter {
            FilterExpression::MatchAll => EsQuery::MatchAll(MatchAllQuery::default()),

            FilterExpression::Term { field, value } => {
                let mut fields = BTreeMap::new();
                fields.insert(
                    field.clone(),
                    TermQuery {
                        value: term_value(value),
                    },
                );
                EsQuery::Term(fields)
            }

            FilterExpression::Match { field, text } => {
                let mut fields = BTreeMap::new();
                fields.insert(field.clone(), MatchQuery { query: text.clone() });
                EsQuery::Match(fields)
            }

            FilterExpression::Range { field, gte, lte } => {
                let mut fields = BTreeMap::new();
                fields.insert(
                    field.clone(),
                    RangeParams {
                        gte: gte.as_ref().map(range_bound),
                        lte: lte.as_ref().map(range_bound),
                    },
                );
                EsQuery::Range(fields)
            }

            FilterExpression::Bool(b) => EsQuery::Bool(Self::translate_bool(b)),
        }
    }

    fn translate_bool(bool_filter: &BoolFilter) -> BoolQuery {
        let all = |clauses: &[FilterExpression]| -> Vec<EsQuery> {
            clauses.iter().map(Self::translate_filter).collect()
        };
        BoolQuery {
            must: all(bool_filter.must()),
            should: all(bool_filter.should()),
            must_not: all(bool_filter.must_not()),
            filter: all(bool_filter.filter()),
        }
    }

    /// Translate a set of named aggregations, recursing into sub-aggregations
    pub fn translate_aggregations(aggs: &AggregationSet) -> BTreeMap<String, EsAggregation> {
        aggs.iter()
            .map(|(name, node)| (name.to_string(), Self::translate_node(node)))
            .collect()
    }

    fn translate_node(node: &AggregationNode) -> EsAggregation {
        let mut agg = EsAggregation::default();

        match node {
            AggregationNode::Metric { kind, field } => {
                let target = Some(FieldAgg::new(field.as_str()));
                match kind {
                    MetricKind::Sum => agg.sum = target,
                    MetricKind::Avg => agg.avg = target,
                    MetricKind::Min => agg.min = target,
                    MetricKind::Max => agg.max = target,
                    MetricKind::ValueCount => agg.value_count = target,
                }
            }
            AggregationNode::Terms { field, size, .. } => {
                agg.terms = Some(TermsAgg {
                    field: field.clone(),
                    size: *size,
                });
            }
            AggregationNode::MultiTerms { fields, size, .. } => {
                agg.multi_terms = Some(MultiTermsAgg {
                    terms: fields.iter().map(|f| FieldAgg::new(f.as_str())).collect(),
                    size: *size,
                });
            }
            AggregationNode::DateHistogram {
                field, interval, ..
            } => {
                let format = match interval {
                    CalendarInterval::Hour => HOUR_FORMAT,
                    _ => DATE_FORMAT,
                };
                agg.date_histogram = Some(DateHistogramAgg {
                    field: field.clone(),
                    calendar_interval: interval.as_str().to_string(),
                    format: Some(format.to_string()),
                    min_doc_count: Some(0),
                });
            }
        }

        if let Some(subs) = node.sub_aggregations() {
            if !subs.is_empty() {
                agg.aggs = Some(Self::translate_aggregations(subs));
            }
        }

        agg
    }
}

fn term_value(value: &TermValue) -> Value {
    match value {
        TermValue::Keyword(s) => Value::String(s.clone()),
        TermValue::Long(n) => json!(n),
        TermValue::Bool(b) => Value::Bool(*b),
    }
}

fn range_bound(bound: &RangeBound) -> Value {
    match bound {
        RangeBound::Number(n) => json!(n),
        RangeBound::Date(_) | RangeBound::DateMath(_) => Value::String(bound.to_string()),
    }
}
