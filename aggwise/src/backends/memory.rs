//! In-memory reference store
//!
//! Evaluates [`QueryRequest`]s over JSON documents held in process and answers
//! with the same tagged aggregation shapes a search engine would: keyword
//! fields group as `stringTerms`, integer and boolean fields as
//! `numericTerms`, multi-field groupings as `compositeTerms`. Floating point
//! fields group as `doubleTerms`, which no decoding path handles.
//!
//! Used by tests and by the server's `memory` backend.

use crate::aggregations::{AggregationNode, AggregationSet, CalendarInterval, MetricKind};
use crate::backends::r#trait::{
    DocumentRepository, Hit, KeyPart, RawAggregate, RawBucket, RawResponse, SearchClient,
};
use crate::error::{Result, TransportError};
use crate::models::OrderDocument;
use crate::query::{FilterExpression, QueryRequest, RangeBound, SortField, SortOrder, TermValue};
use async_trait::async_trait;
use chrono::{DateTime, Days, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Most buckets a single histogram may produce, as with `search.max_buckets`
pub const MAX_BUCKETS: usize = 65_536;

type Eval<T> = std::result::Result<T, TransportError>;

/// Document store backed by a vector of `(id, source)` pairs.
///
/// Hits without an explicit sort come back in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    docs: RwLock<Vec<(String, Value)>>,
    now: Option<NaiveDateTime>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the clock used for `now` date math
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }

    /// Insert or replace the document stored under `id`
    pub fn insert(&self, id: impl Into<String>, source: Value) {
        let id = id.into();
        let mut docs = self.docs.write();
        match docs.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => slot.1 = source,
            None => docs.push((id, source)),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    fn now(&self) -> NaiveDateTime {
        self.now.unwrap_or_else(|| Utc::now().naive_utc())
    }
}

#[async_trait]
impl SearchClient for InMemoryStore {
    async fn execute(&self, request: &QueryRequest) -> std::result::Result<RawResponse, TransportError> {
        let docs = self.docs.read();
        let now = self.now();
        let filter = request.effective_filter();

        let mut matched = Vec::new();
        for doc in docs.iter() {
            if eval_filter(&filter, &doc.1, now)? {
                matched.push(doc);
            }
        }
        let total_hits = matched.len() as u64;

        let sources: Vec<&Value> = matched.iter().map(|(_, source)| source).collect();
        let aggregations = if request.aggregations.is_empty() {
            None
        } else {
            Some(aggregate_set(&request.aggregations, &sources)?)
        };

        if !request.sort.is_empty() {
            matched.sort_by(|a, b| compare_for_sort(&request.sort, &a.1, &b.1));
        }
        let (offset, limit) = request.hit_window();
        let hits = matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(id, source)| Hit {
                id: id.clone(),
                source: source.clone(),
            })
            .collect();

        debug!(
            "In-memory query matched {} of {} documents",
            total_hits,
            docs.len()
        );

        Ok(RawResponse {
            total_hits,
            hits,
            aggregations,
        })
    }
}

#[async_trait]
impl DocumentRepository<OrderDocument> for InMemoryStore {
    async fn save(&self, mut doc: OrderDocument) -> Result<OrderDocument> {
        let id = doc
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        doc.id = Some(id.clone());

        let mut source = serde_json::to_value(&doc)?;
        if let Value::Object(map) = &mut source {
            map.remove("id");
        }
        self.insert(id, source);
        Ok(doc)
    }

    async fn find_by_field(&self, field: &str, value: &str) -> Result<Vec<OrderDocument>> {
        let wanted = TermValue::Keyword(value.to_string());
        let docs = self.docs.read();
        let mut found = Vec::new();
        for (id, source) in docs.iter() {
            if lookup(source, field).is_some_and(|v| term_matches(v, &wanted)) {
                let doc: OrderDocument = serde_json::from_value(source.clone())?;
                found.push(doc.with_id(id.clone()));
            }
        }
        Ok(found)
    }
}

// ============================================================================
// Filter evaluation
// ============================================================================

fn lookup<'a>(source: &'a Value, field: &str) -> Option<&'a Value> {
    let path = field.strip_suffix(".keyword").unwrap_or(field);
    path.split('.')
        .try_fold(source, |value, segment| value.get(segment))
        .filter(|value| !value.is_null())
}

fn eval_filter(
    filter: &FilterExpression,
    source: &Value,
    now: NaiveDateTime,
) -> std::result::Result<bool, TransportError> {
    match filter {
        FilterExpression::MatchAll => Ok(true),
        FilterExpression::Term { field, value } => {
            Ok(lookup(source, field).is_some_and(|v| term_matches(v, value)))
        }
        FilterExpression::Match { field, text } => {
            Ok(lookup(source, field).is_some_and(|v| text_matches(v, text)))
        }
        FilterExpression::Range { field, gte, lte } => match lookup(source, field) {
            Some(v) => range_matches(v, gte.as_ref(), lte.as_ref(), now),
            None => Ok(false),
        },
        FilterExpression::Bool(b) => {
            for clause in b.must().iter().chain(b.filter()) {
                if !eval_filter(clause, source, now)? {
                    return Ok(false);
                }
            }
            for clause in b.must_not() {
                if eval_filter(clause, source, now)? {
                    return Ok(false);
                }
            }
            // should is optional once a required clause exists
            if b.should().is_empty() || !b.must().is_empty() || !b.filter().is_empty() {
                return Ok(true);
            }
            for clause in b.should() {
                if eval_filter(clause, source, now)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

fn term_matches(value: &Value, term: &TermValue) -> bool {
    match (value, term) {
        (Value::Array(items), _) => items.iter().any(|item| term_matches(item, term)),
        (Value::String(s), TermValue::Keyword(k)) => s == k,
        (Value::Number(n), TermValue::Long(l)) => n.as_f64() == Some(*l as f64),
        (Value::Number(n), TermValue::Keyword(k)) => {
            k.parse::<f64>().ok().is_some_and(|k| n.as_f64() == Some(k))
        }
        (Value::Bool(b), TermValue::Bool(t)) => b == t,
        (Value::Bool(b), TermValue::Keyword(k)) => b.to_string() == *k,
        _ => false,
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Any query token present in the field text
fn text_matches(value: &Value, text: &str) -> bool {
    let field_text = match value {
        Value::Array(items) => return items.iter().any(|item| text_matches(item, text)),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return false,
    };
    let field_tokens = tokens(&field_text);
    tokens(text).iter().any(|t| field_tokens.contains(t))
}

fn range_matches(
    value: &Value,
    gte: Option<&RangeBound>,
    lte: Option<&RangeBound>,
    now: NaiveDateTime,
) -> std::result::Result<bool, TransportError> {
    if let Some(bound) = gte {
        match compare_to_bound(value, bound, now)? {
            Some(Ordering::Greater | Ordering::Equal) => {}
            _ => return Ok(false),
        }
    }
    if let Some(bound) = lte {
        match compare_to_bound(value, bound, now)? {
            Some(Ordering::Less | Ordering::Equal) => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}

fn compare_to_bound(
    value: &Value,
    bound: &RangeBound,
    now: NaiveDateTime,
) -> std::result::Result<Option<Ordering>, TransportError> {
    let ordering = match bound {
        RangeBound::Number(n) => as_number(value).and_then(|v| v.partial_cmp(n)),
        RangeBound::Date(d) => as_datetime(value).map(|v| v.cmp(&d.and_time(NaiveTime::MIN))),
        RangeBound::DateMath(expr) => {
            let at = resolve_date_math(expr, now)?;
            as_datetime(value).map(|v| v.cmp(&at))
        }
    };
    Ok(ordering)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn as_datetime(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => parse_datetime(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.naive_utc()),
        _ => None,
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.naive_utc())
}

/// Resolve `now[(+|-)<n><unit>]*[/<unit>]`
fn resolve_date_math(
    expr: &str,
    now: NaiveDateTime,
) -> std::result::Result<NaiveDateTime, TransportError> {
    let parse_error = || TransportError::Status {
        status: 400,
        body: format!("failed to parse date math expression [{expr}]"),
    };

    let rest = expr.strip_prefix("now").ok_or_else(parse_error)?;
    let (mut ops, rounding) = match rest.split_once('/') {
        Some((ops, unit)) => (ops, Some(unit)),
        None => (rest, None),
    };

    let mut at = now;
    while let Some(sign) = ops.chars().next() {
        let body = &ops[sign.len_utf8()..];
        let digits = body
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(parse_error)?;
        let amount: u32 = body[..digits].parse().map_err(|_| parse_error())?;
        let unit = body[digits..].chars().next().ok_or_else(parse_error)?;
        at = match sign {
            '+' => shift(at, amount, unit, true),
            '-' => shift(at, amount, unit, false),
            _ => None,
        }
        .ok_or_else(parse_error)?;
        ops = &body[digits + unit.len_utf8()..];
    }

    if let Some(unit) = rounding {
        let interval = match unit {
            "y" => CalendarInterval::Year,
            "M" => CalendarInterval::Month,
            "w" => CalendarInterval::Week,
            "d" => CalendarInterval::Day,
            "h" | "H" => CalendarInterval::Hour,
            _ => return Err(parse_error()),
        };
        at = interval.floor(at);
    }
    Ok(at)
}

fn shift(at: NaiveDateTime, amount: u32, unit: char, forward: bool) -> Option<NaiveDateTime> {
    let signed = if forward {
        i64::from(amount)
    } else {
        -i64::from(amount)
    };
    match unit {
        'y' | 'M' => {
            let months = Months::new(if unit == 'y' { amount.checked_mul(12)? } else { amount });
            if forward {
                at.checked_add_months(months)
            } else {
                at.checked_sub_months(months)
            }
        }
        'w' | 'd' => {
            let days = Days::new(u64::from(amount) * if unit == 'w' { 7 } else { 1 });
            if forward {
                at.checked_add_days(days)
            } else {
                at.checked_sub_days(days)
            }
        }
        'h' | 'H' => at.checked_add_signed(Duration::hours(signed)),
        'm' => at.checked_add_signed(Duration::minutes(signed)),
        's' => at.checked_add_signed(Duration::seconds(signed)),
        _ => None,
    }
}

fn compare_for_sort(sort: &[SortField], a: &Value, b: &Value) -> Ordering {
    for key in sort {
        let ordering = match (lookup(a, &key.field), lookup(b, &key.field)) {
            (Some(x), Some(y)) => {
                let ordering = compare_values(x, y);
                match key.order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            }
            // missing values sort last in either direction
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

// ============================================================================
// Aggregation evaluation
// ============================================================================

fn aggregate_set(aggs: &AggregationSet, docs: &[&Value]) -> Eval<HashMap<String, RawAggregate>> {
    aggs.iter()
        .map(|(name, node)| Ok((name.to_string(), aggregate(node, docs)?)))
        .collect()
}

fn aggregate(node: &AggregationNode, docs: &[&Value]) -> Eval<RawAggregate> {
    match node {
        AggregationNode::Metric { kind, field } => Ok(metric(*kind, field, docs)),
        AggregationNode::Terms { field, size, aggs } => terms(field, *size, aggs, docs),
        AggregationNode::MultiTerms { fields, size, aggs } => multi_terms(fields, *size, aggs, docs),
        AggregationNode::DateHistogram {
            field,
            interval,
            aggs,
        } => date_histogram(field, *interval, aggs, docs),
    }
}

/// All values of `field` in `source`, arrays flattened
fn field_values<'a>(source: &'a Value, field: &str) -> Vec<&'a Value> {
    match lookup(source, field) {
        Some(Value::Array(items)) => items.iter().filter(|v| !v.is_null()).collect(),
        Some(value) => vec![value],
        None => Vec::new(),
    }
}

fn metric(kind: MetricKind, field: &str, docs: &[&Value]) -> RawAggregate {
    let raw: Vec<&Value> = docs.iter().flat_map(|doc| field_values(doc, field)).collect();
    let numbers: Vec<f64> = raw
        .iter()
        .filter_map(|v| {
            as_number(v).or_else(|| {
                as_datetime(v).map(|dt| dt.and_utc().timestamp_millis() as f64)
            })
        })
        .collect();

    let sum: f64 = numbers.iter().sum();
    let non_empty = !numbers.is_empty();
    match kind {
        MetricKind::Sum => RawAggregate::Sum { value: Some(sum) },
        MetricKind::Avg => RawAggregate::Avg {
            value: non_empty.then(|| sum / numbers.len() as f64),
        },
        MetricKind::Min => RawAggregate::Min {
            value: numbers.iter().copied().reduce(f64::min),
        },
        MetricKind::Max => RawAggregate::Max {
            value: numbers.iter().copied().reduce(f64::max),
        },
        MetricKind::ValueCount => RawAggregate::ValueCount {
            value: Some(raw.len() as f64),
        },
    }
}

fn key_part(value: &Value) -> Option<KeyPart> {
    match value {
        Value::String(s) => Some(KeyPart::Str(s.clone())),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(KeyPart::Long(i)),
            None => n.as_f64().map(KeyPart::Double),
        },
        Value::Bool(b) => Some(KeyPart::Bool(*b)),
        _ => None,
    }
}

fn same_kind(a: &KeyPart, b: &KeyPart) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

fn part_text(part: &KeyPart) -> String {
    match part {
        KeyPart::Str(s) => s.clone(),
        KeyPart::Long(n) => n.to_string(),
        KeyPart::Double(d) => d.to_string(),
        KeyPart::Bool(b) => b.to_string(),
    }
}

fn compare_parts(a: &KeyPart, b: &KeyPart) -> Ordering {
    match (a, b) {
        (KeyPart::Long(x), KeyPart::Long(y)) => x.cmp(y),
        (KeyPart::Double(x), KeyPart::Double(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (KeyPart::Bool(x), KeyPart::Bool(y)) => x.cmp(y),
        _ => part_text(a).cmp(&part_text(b)),
    }
}

struct Group<'a, K> {
    key: K,
    docs: Vec<&'a Value>,
}

/// Doc count descending, ties by key ascending, capped at `size`
fn rank_groups<'a, K>(
    mut groups: Vec<Group<'a, K>>,
    size: usize,
    cmp_keys: impl Fn(&K, &K) -> Ordering,
) -> Vec<Group<'a, K>> {
    groups.sort_by(|a, b| {
        b.docs
            .len()
            .cmp(&a.docs.len())
            .then_with(|| cmp_keys(&a.key, &b.key))
    });
    groups.truncate(size);
    groups
}

fn terms(field: &str, size: usize, aggs: &AggregationSet, docs: &[&Value]) -> Eval<RawAggregate> {
    let mut groups: Vec<Group<KeyPart>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut kind: Option<KeyPart> = None;

    for &doc in docs {
        let mut seen: Vec<String> = Vec::new();
        for value in field_values(doc, field) {
            let Some(part) = key_part(value) else {
                continue;
            };
            let kind = kind.get_or_insert_with(|| part.clone());
            if !same_kind(kind, &part) {
                continue;
            }
            let text = part_text(&part);
            if seen.contains(&text) {
                continue;
            }
            seen.push(text.clone());
            let slot = *index.entry(text).or_insert_with(|| {
                groups.push(Group {
                    key: part,
                    docs: Vec::new(),
                });
                groups.len() - 1
            });
            groups[slot].docs.push(doc);
        }
    }

    let groups = rank_groups(groups, size, compare_parts);
    Ok(match kind {
        None | Some(KeyPart::Str(_)) => RawAggregate::StringTerms {
            buckets: groups
                .iter()
                .map(|g| raw_bucket(part_text(&g.key), &g.docs, aggs))
                .collect::<Eval<_>>()?,
        },
        Some(KeyPart::Long(_)) => RawAggregate::NumericTerms {
            buckets: groups
                .iter()
                .filter_map(|g| match g.key {
                    KeyPart::Long(n) => Some(raw_bucket(n, &g.docs, aggs)),
                    _ => None,
                })
                .collect::<Eval<_>>()?,
        },
        Some(KeyPart::Bool(_)) => RawAggregate::NumericTerms {
            buckets: groups
                .iter()
                .filter_map(|g| match g.key {
                    KeyPart::Bool(b) => Some(raw_bucket(i64::from(b), &g.docs, aggs).map(
                        |mut bucket| {
                            bucket.key_as_string = Some(b.to_string());
                            bucket
                        },
                    )),
                    _ => None,
                })
                .collect::<Eval<_>>()?,
        },
        Some(KeyPart::Double(_)) => RawAggregate::Unknown {
            tag: "doubleTerms".to_string(),
        },
    })
}

fn raw_bucket<K>(key: K, docs: &[&Value], aggs: &AggregationSet) -> Eval<RawBucket<K>> {
    let mut bucket = RawBucket::new(key, docs.len() as u64);
    bucket.aggregations = aggregate_set(aggs, docs)?;
    Ok(bucket)
}

fn multi_terms(
    fields: &[String],
    size: usize,
    aggs: &AggregationSet,
    docs: &[&Value],
) -> Eval<RawAggregate> {
    let mut groups: Vec<Group<Vec<KeyPart>>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for &doc in docs {
        // documents missing any of the fields are left out
        let parts: Option<Vec<KeyPart>> = fields
            .iter()
            .map(|field| field_values(doc, field).first().and_then(|v| key_part(v)))
            .collect();
        let Some(parts) = parts else {
            continue;
        };
        let text = parts.iter().map(part_text).collect::<Vec<_>>().join("|");
        let slot = *index.entry(text).or_insert_with(|| {
            groups.push(Group {
                key: parts,
                docs: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].docs.push(doc);
    }

    let groups = rank_groups(groups, size, |a, b| {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| compare_parts(x, y))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });

    Ok(RawAggregate::CompositeTerms {
        buckets: groups
            .into_iter()
            .map(|g| {
                let text = g.key.iter().map(part_text).collect::<Vec<_>>().join("|");
                let mut bucket = raw_bucket(g.key, &g.docs, aggs)?;
                bucket.key_as_string = Some(text);
                Ok(bucket)
            })
            .collect::<Eval<_>>()?,
    })
}

fn date_histogram(
    field: &str,
    interval: CalendarInterval,
    aggs: &AggregationSet,
    docs: &[&Value],
) -> Eval<RawAggregate> {
    let mut placed: Vec<(NaiveDateTime, &Value)> = docs
        .iter()
        .filter_map(|&doc| {
            field_values(doc, field)
                .first()
                .and_then(|v| as_datetime(v))
                .map(|dt| (interval.floor(dt), doc))
        })
        .collect();
    placed.sort_by_key(|(start, _)| *start);

    let (Some(first), Some(last)) = (placed.first(), placed.last()) else {
        return Ok(RawAggregate::DateHistogram {
            buckets: Vec::new(),
        });
    };
    let (first, last) = (first.0, last.0);

    // every interval between the first and last populated one is emitted
    let mut buckets = Vec::new();
    let mut rest = placed.as_slice();
    let mut cursor = Some(first);
    while let Some(start) = cursor.filter(|start| *start <= last) {
        if buckets.len() == MAX_BUCKETS {
            return Err(TransportError::Status {
                status: 400,
                body: format!(
                    "date_histogram on [{field}] would create more than {MAX_BUCKETS} buckets"
                ),
            });
        }
        let taken = rest.iter().take_while(|(s, _)| *s == start).count();
        let in_bucket: Vec<&Value> = rest[..taken].iter().map(|(_, doc)| *doc).collect();
        rest = &rest[taken..];

        let mut bucket = raw_bucket(start.and_utc().timestamp_millis(), &in_bucket, aggs)?;
        bucket.key_as_string = Some(match interval {
            CalendarInterval::Hour => start.format("%Y-%m-%dT%H:00:00").to_string(),
            _ => start.format("%Y-%m-%d").to_string(),
        });
        buckets.push(bucket);
        cursor = interval.next(start);
    }

    Ok(RawAggregate::DateHistogram { buckets })
}
