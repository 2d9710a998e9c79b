//! Response parser from Elasticsearch search responses to raw aggwise results
//!
//! Requests are sent with `typed_keys=true`, so every aggregation key in the
//! response reads `<type>#<name>`. The type prefix decides the
//! [`RawAggregate`] variant; the decoder never has to guess from the JSON
//! shape.

use crate::error::EsError;
use aggwise::backends::{Hit, KeyPart, RawAggregate, RawBucket, RawResponse};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Bucket fields that are never sub-aggregations
const BUCKET_FIELDS: &[&str] = &["key", "key_as_string", "doc_count"];

/// Parses ES search response bodies
pub struct ResponseParser;

impl ResponseParser {
    /// Parse a full `_search` response body
    pub fn parse(body: &Value) -> Result<RawResponse, EsError> {
        let hits_section = body
            .get("hits")
            .ok_or_else(|| EsError::malformed("response has no 'hits' section"))?;

        let hits = match hits_section.get("hits") {
            Some(Value::Array(items)) => items
                .iter()
                .map(Self::parse_hit)
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(EsError::malformed("'hits.hits' is not an array")),
            None => Vec::new(),
        };

        // `total` is an object since ES 7, a bare number before that
        let total_hits = match hits_section.get("total") {
            Some(Value::Object(total)) => total.get("value").and_then(Value::as_u64),
            Some(other) => other.as_u64(),
            None => None,
        }
        .unwrap_or(hits.len() as u64);

        let aggregations = match body.get("aggregations") {
            Some(Value::Object(aggs)) => Some(Self::parse_aggregations(aggs)?),
            Some(Value::Null) | None => None,
            Some(_) => return Err(EsError::malformed("'aggregations' is not an object")),
        };

        Ok(RawResponse {
            total_hits,
            hits,
            aggregations,
        })
    }

    fn parse_hit(hit: &Value) -> Result<Hit, EsError> {
        let id = hit
            .get("_id")
            .and_then(Value::as_str)
            .ok_or_else(|| EsError::malformed("hit without '_id'"))?;
        Ok(Hit {
            id: id.to_string(),
            source: hit.get("_source").cloned().unwrap_or(Value::Null),
        })
    }

    /// Parse a map of typed aggregation keys
    pub fn parse_aggregations(
        aggs: &Map<String, Value>,
    ) -> Result<HashMap<String, RawAggregate>, EsError> {
        let mut out = HashMap::with_capacity(aggs.len());
        for (typed_key, value) in aggs {
            let (tag, name) = match typed_key.split_once('#') {
                Some((tag, name)) => (tag, name),
                None => ("untyped", typed_key.as_str()),
            };
            out.insert(name.to_string(), Self::parse_aggregate(tag, name, value)?);
        }
        Ok(out)
    }

    fn parse_aggregate(tag: &str, name: &str, value: &Value) -> Result<RawAggregate, EsError> {
        let metric = || value.get("value").and_then(Value::as_f64);

        let agg = match tag {
            "sum" => RawAggregate::Sum { value: metric() },
            "avg" => RawAggregate::Avg { value: metric() },
            "min" => RawAggregate::Min { value: metric() },
            "max" => RawAggregate::Max { value: metric() },
            "value_count" => RawAggregate::ValueCount { value: metric() },
            "sterms" => RawAggregate::StringTerms {
                buckets: Self::buckets(name, value, |k| k.as_str().map(String::from))?,
            },
            "lterms" => RawAggregate::NumericTerms {
                buckets: Self::buckets(name, value, Value::as_i64)?,
            },
            "multi_terms" => RawAggregate::CompositeTerms {
                buckets: Self::buckets(name, value, composite_key)?,
            },
            "date_histogram" => RawAggregate::DateHistogram {
                buckets: Self::buckets(name, value, epoch_millis)?,
            },
            "dterms" => RawAggregate::Unknown {
                tag: "doubleTerms".to_string(),
            },
            other => RawAggregate::Unknown {
                tag: other.to_string(),
            },
        };
        Ok(agg)
    }

    fn buckets<K>(
        name: &str,
        value: &Value,
        key: impl Fn(&Value) -> Option<K>,
    ) -> Result<Vec<RawBucket<K>>, EsError> {
        let items = value
            .get("buckets")
            .and_then(Value::as_array)
            .ok_or_else(|| EsError::malformed(format!("aggregation '{name}' has no bucket list")))?;

        items
            .iter()
            .map(|item| {
                let obj = item.as_object().ok_or_else(|| {
                    EsError::malformed(format!("bucket of '{name}' is not an object"))
                })?;
                let raw_key = obj.get("key").and_then(&key).ok_or_else(|| {
                    EsError::malformed(format!("bucket of '{name}' has an unexpected key"))
                })?;
                let doc_count = obj.get("doc_count").and_then(Value::as_u64).ok_or_else(|| {
                    EsError::malformed(format!("bucket of '{name}' has no doc_count"))
                })?;

                let subs: Map<String, Value> = obj
                    .iter()
                    .filter(|(k, v)| !BUCKET_FIELDS.contains(&k.as_str()) && v.is_object())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();

                Ok(RawBucket {
                    key: raw_key,
                    key_as_string: obj
                        .get("key_as_string")
                        .and_then(Value::as_str)
                        .map(String::from),
                    doc_count,
                    aggregations: Self::parse_aggregations(&subs)?,
                })
            })
            .collect()
    }
}

fn epoch_millis(key: &Value) -> Option<i64> {
    key.as_i64().or_else(|| key.as_f64().map(|f| f as i64))
}

fn composite_key(key: &Value) -> Option<Vec<KeyPart>> {
    key.as_array()?
        .iter()
        .map(|part| match part {
            Value::String(s) => Some(KeyPart::Str(s.clone())),
            Value::Bool(b) => Some(KeyPart::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(KeyPart::Long)
                .or_else(|| n.as_f64().map(KeyPart::Double)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(body: Value) -> RawResponse {
        ResponseParser::parse(&body).unwrap()
    }

    // ========================================================================
    // Hits
    // ========================================================================

    #[test]
    fn test_hits_and_total() {
        let response = parse(json!({
            "took": 3,
            "hits": {
                "total": {"value": 42, "relation": "eq"},
                "hits": [
                    {"_index": "orders", "_id": "a1", "_source": {"customer": "A"}},
                    {"_index": "orders", "_id": "a2", "_source": {"customer": "B"}}
                ]
            }
        }));
        assert_eq!(response.total_hits, 42);
        assert_eq!(response.hits.len(), 2);
        assert_eq!(response.hits[0].id, "a1");
        assert_eq!(response.hits[1].source["customer"], "B");
        assert!(response.aggregations.is_none());
    }

    #[test]
    fn test_legacy_numeric_total() {
        let response = parse(json!({"hits": {"total": 7, "hits": []}}));
        assert_eq!(response.total_hits, 7);
    }

    #[test]
    fn test_missing_hits_section_is_malformed() {
        let err = ResponseParser::parse(&json!({"took": 1})).unwrap_err();
        assert!(matches!(err, EsError::MalformedResponse(_)));
    }

    #[test]
    fn test_hit_without_id_is_malformed() {
        let err =
            ResponseParser::parse(&json!({"hits": {"hits": [{"_source": {}}]}})).unwrap_err();
        assert!(matches!(err, EsError::MalformedResponse(_)));
    }

    // ========================================================================
    // Metrics
    // ========================================================================

    #[test]
    fn test_metric_values() {
        let response = parse(json!({
            "hits": {"total": {"value": 0}, "hits": []},
            "aggregations": {
                "sum#total_revenue": {"value": 350.0},
                "avg#avg_order_value": {"value": null},
                "min#min_amount": {"value": null},
                "max#max_amount": {"value": 200.0},
                "value_count#total_orders": {"value": 3}
            }
        }));
        assert_eq!(
            response.aggregation("total_revenue"),
            Some(&RawAggregate::Sum { value: Some(350.0) })
        );
        assert_eq!(
            response.aggregation("avg_order_value"),
            Some(&RawAggregate::Avg { value: None })
        );
        assert_eq!(
            response.aggregation("min_amount"),
            Some(&RawAggregate::Min { value: None })
        );
        assert_eq!(
            response.aggregation("total_orders"),
            Some(&RawAggregate::ValueCount { value: Some(3.0) })
        );
    }

    // ========================================================================
    // Buckets
    // ========================================================================

    #[test]
    fn test_string_terms_with_nested_metric() {
        let response = parse(json!({
            "hits": {"total": {"value": 3}, "hits": []},
            "aggregations": {
                "sterms#revenue_per_customer": {
                    "doc_count_error_upper_bound": 0,
                    "sum_other_doc_count": 0,
                    "buckets": [
                        {"key": "A", "doc_count": 2, "sum#total_spent": {"value": 150.0}},
                        {"key": "B", "doc_count": 1, "sum#total_spent": {"value": 200.0}}
                    ]
                }
            }
        }));
        let expected = RawAggregate::StringTerms {
            buckets: vec![
                RawBucket::new("A".to_string(), 2)
                    .with_sub("total_spent", RawAggregate::Sum { value: Some(150.0) }),
                RawBucket::new("B".to_string(), 1)
                    .with_sub("total_spent", RawAggregate::Sum { value: Some(200.0) }),
            ],
        };
        assert_eq!(response.aggregation("revenue_per_customer"), Some(&expected));
    }

    #[test]
    fn test_long_terms_keep_key_as_string() {
        let response = parse(json!({
            "hits": {"total": {"value": 2}, "hits": []},
            "aggregations": {
                "lterms#active": {"buckets": [
                    {"key": 1, "key_as_string": "true", "doc_count": 2}
                ]}
            }
        }));
        match response.aggregation("active") {
            Some(RawAggregate::NumericTerms { buckets }) => {
                assert_eq!(buckets[0].key, 1);
                assert_eq!(buckets[0].key_as_string.as_deref(), Some("true"));
            }
            other => panic!("unexpected aggregate: {other:?}"),
        }
    }

    #[test]
    fn test_multi_terms_key_parts() {
        let response = parse(json!({
            "hits": {"total": {"value": 3}, "hits": []},
            "aggregations": {
                "multi_terms#by_region_tier": {"buckets": [
                    {"key": ["east", "gold"], "key_as_string": "east|gold", "doc_count": 2},
                    {"key": ["west", 3], "key_as_string": "west|3", "doc_count": 1}
                ]}
            }
        }));
        match response.aggregation("by_region_tier") {
            Some(RawAggregate::CompositeTerms { buckets }) => {
                assert_eq!(
                    buckets[0].key,
                    vec![KeyPart::Str("east".into()), KeyPart::Str("gold".into())]
                );
                assert_eq!(
                    buckets[1].key,
                    vec![KeyPart::Str("west".into()), KeyPart::Long(3)]
                );
            }
            other => panic!("unexpected aggregate: {other:?}"),
        }
    }

    #[test]
    fn test_date_histogram_buckets() {
        let response = parse(json!({
            "hits": {"total": {"value": 2}, "hits": []},
            "aggregations": {
                "date_histogram#daily_sales": {"buckets": [
                    {
                        "key_as_string": "2024-06-01",
                        "key": 1717200000000i64,
                        "doc_count": 2,
                        "sum#total_sales": {"value": 300.0},
                        "avg#avg_sales": {"value": 150.0}
                    }
                ]}
            }
        }));
        match response.aggregation("daily_sales") {
            Some(RawAggregate::DateHistogram { buckets }) => {
                assert_eq!(buckets[0].key, 1_717_200_000_000);
                assert_eq!(buckets[0].key_as_string.as_deref(), Some("2024-06-01"));
                assert_eq!(buckets[0].aggregations.len(), 2);
            }
            other => panic!("unexpected aggregate: {other:?}"),
        }
    }

    #[test]
    fn test_double_terms_and_unknown_tags() {
        let response = parse(json!({
            "hits": {"total": {"value": 0}, "hits": []},
            "aggregations": {
                "dterms#by_amount": {"buckets": [{"key": 1.5, "doc_count": 1}]},
                "percentiles#p": {"values": {"50.0": 3.0}},
                "plain": {"value": 1.0}
            }
        }));
        assert_eq!(
            response.aggregation("by_amount"),
            Some(&RawAggregate::Unknown {
                tag: "doubleTerms".to_string()
            })
        );
        assert_eq!(response.aggregation("p").map(|a| a.tag()), Some("percentiles"));
        assert_eq!(response.aggregation("plain").map(|a| a.tag()), Some("untyped"));
    }

    #[test]
    fn test_terms_without_buckets_is_malformed() {
        let err = ResponseParser::parse(&json!({
            "hits": {"hits": []},
            "aggregations": {"sterms#c": {"value": 1}}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("'c'"));
    }

    #[test]
    fn test_wrong_key_type_is_malformed() {
        let err = ResponseParser::parse(&json!({
            "hits": {"hits": []},
            "aggregations": {"lterms#c": {"buckets": [{"key": "x", "doc_count": 1}]}}
        }))
        .unwrap_err();
        assert!(matches!(err, EsError::MalformedResponse(_)));
    }
}
