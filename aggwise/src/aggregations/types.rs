use crate::error::{Error, Result};
use chrono::{Datelike, Days, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Sum,
    Avg,
    Min,
    Max,
    ValueCount,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Sum => "sum",
            MetricKind::Avg => "avg",
            MetricKind::Min => "min",
            MetricKind::Max => "max",
            MetricKind::ValueCount => "value_count",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarInterval {
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl CalendarInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarInterval::Hour => "hour",
            CalendarInterval::Day => "day",
            CalendarInterval::Week => "week",
            CalendarInterval::Month => "month",
            CalendarInterval::Quarter => "quarter",
            CalendarInterval::Year => "year",
        }
    }

    pub fn parse_interval(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hour" | "1h" => Some(CalendarInterval::Hour),
            "day" | "1d" => Some(CalendarInterval::Day),
            "week" | "1w" => Some(CalendarInterval::Week),
            "month" | "1m" => Some(CalendarInterval::Month),
            "quarter" | "1q" => Some(CalendarInterval::Quarter),
            "year" | "1y" => Some(CalendarInterval::Year),
            _ => None,
        }
    }

    /// Round down to the start of the enclosing interval
    pub fn floor(&self, dt: NaiveDateTime) -> NaiveDateTime {
        let date = dt.date();
        match self {
            CalendarInterval::Hour => date.and_hms_opt(dt.hour(), 0, 0).unwrap_or(dt),
            CalendarInterval::Day => date.and_time(NaiveTime::MIN),
            CalendarInterval::Week => {
                let days_from_monday = date.weekday().num_days_from_monday() as u64;
                (date - Days::new(days_from_monday)).and_time(NaiveTime::MIN)
            }
            CalendarInterval::Month => first_of(date.year(), date.month(), date),
            CalendarInterval::Quarter => {
                let month = (date.month0() / 3) * 3 + 1;
                first_of(date.year(), month, date)
            }
            CalendarInterval::Year => first_of(date.year(), 1, date),
        }
    }

    /// Start of the interval after the one starting at `start`
    pub fn next(&self, start: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            CalendarInterval::Hour => start.checked_add_signed(Duration::hours(1)),
            CalendarInterval::Day => start.checked_add_days(Days::new(1)),
            CalendarInterval::Week => start.checked_add_days(Days::new(7)),
            CalendarInterval::Month => start.checked_add_months(Months::new(1)),
            CalendarInterval::Quarter => start.checked_add_months(Months::new(3)),
            CalendarInterval::Year => start.checked_add_months(Months::new(12)),
        }
    }
}

fn first_of(year: i32, month: u32, fallback: NaiveDate) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or(fallback)
        .and_time(NaiveTime::MIN)
}

/// One node of an aggregation tree
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationNode {
    Metric {
        kind: MetricKind,
        field: String,
    },
    /// Buckets by exact field value, at most `size` buckets by doc count
    Terms {
        field: String,
        size: usize,
        aggs: AggregationSet,
    },
    /// Buckets by the combination of several field values
    MultiTerms {
        fields: Vec<String>,
        size: usize,
        aggs: AggregationSet,
    },
    DateHistogram {
        field: String,
        interval: CalendarInterval,
        aggs: AggregationSet,
    },
}

impl AggregationNode {
    pub fn sub_aggregations(&self) -> Option<&AggregationSet> {
        match self {
            AggregationNode::Metric { .. } => None,
            AggregationNode::Terms { aggs, .. }
            | AggregationNode::MultiTerms { aggs, .. }
            | AggregationNode::DateHistogram { aggs, .. } => Some(aggs),
        }
    }

    pub fn metric_kind(&self) -> Option<MetricKind> {
        match self {
            AggregationNode::Metric { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_bucket(&self) -> bool {
        !matches!(self, AggregationNode::Metric { .. })
    }

    /// Maximum number of buckets the store may return, if capped
    pub fn bucket_limit(&self) -> Option<usize> {
        match self {
            AggregationNode::Terms { size, .. } | AggregationNode::MultiTerms { size, .. } => {
                Some(*size)
            }
            _ => None,
        }
    }
}

/// Named aggregation siblings; names are unique within a set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationSet {
    entries: BTreeMap<String, AggregationNode>,
}

impl AggregationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<N: Into<String>>(
        entries: impl IntoIterator<Item = (N, AggregationNode)>,
    ) -> Result<Self> {
        let mut set = Self::new();
        for (name, node) in entries {
            set.insert(name, node)?;
        }
        Ok(set)
    }

    pub fn insert(&mut self, name: impl Into<String>, node: AggregationNode) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::validation("aggregation name must not be empty"));
        }
        if self.entries.contains_key(&name) {
            return Err(Error::validation(format!(
                "duplicate aggregation name '{name}' among siblings"
            )));
        }
        self.entries.insert(name, node);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&AggregationNode> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AggregationNode)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a AggregationSet {
    type Item = (&'a String, &'a AggregationNode);
    type IntoIter = std::collections::btree_map::Iter<'a, String, AggregationNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 35, 42)
            .unwrap()
    }

    #[test]
    fn test_floor_hour_and_day() {
        let dt = at(2024, 3, 14, 14);
        assert_eq!(CalendarInterval::Hour.floor(dt), at(2024, 3, 14, 14).with_minute(0).unwrap().with_second(0).unwrap());
        assert_eq!(CalendarInterval::Day.floor(dt).hour(), 0);
        assert_eq!(CalendarInterval::Day.floor(dt).day(), 14);
    }

    #[test]
    fn test_floor_week_starts_monday() {
        // 2024-03-14 is a Thursday
        let floored = CalendarInterval::Week.floor(at(2024, 3, 14, 9));
        assert_eq!(floored.date(), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
    }

    #[test]
    fn test_floor_month_quarter_year() {
        let dt = at(2024, 8, 20, 1);
        assert_eq!(CalendarInterval::Month.floor(dt).date().to_string(), "2024-08-01");
        assert_eq!(CalendarInterval::Quarter.floor(dt).date().to_string(), "2024-07-01");
        assert_eq!(CalendarInterval::Year.floor(dt).date().to_string(), "2024-01-01");
    }

    #[test]
    fn test_next_month_crosses_year() {
        let start = CalendarInterval::Month.floor(at(2024, 12, 5, 0));
        let next = CalendarInterval::Month.next(start).unwrap();
        assert_eq!(next.date().to_string(), "2025-01-01");
    }
}
