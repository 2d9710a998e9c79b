//! Filter expressions
//!
//! Predicate trees that restrict which documents take part in a query before
//! any aggregation runs. Leaves are built through the free functions in this
//! module ([`term`], [`match_text`], [`range`]) and combined with [`and`],
//! [`or`], [`not`] or a [`BoolFilterBuilder`].

use crate::error::{Error, Result};
use chrono::NaiveDate;
use std::fmt;

/// A filter predicate tree
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpression {
    /// Matches every document. Used when a request carries no filter.
    MatchAll,

    /// Exact match on a non-analyzed field
    Term { field: String, value: TermValue },

    /// Analyzed full-text match
    Match { field: String, text: String },

    /// Inclusive range on a numeric or date field
    Range {
        field: String,
        gte: Option<RangeBound>,
        lte: Option<RangeBound>,
    },

    /// Boolean combination. Never empty.
    Bool(BoolFilter),
}

/// Literal value for a term predicate
#[derive(Debug, Clone, PartialEq)]
pub enum TermValue {
    Keyword(String),
    Long(i64),
    Bool(bool),
}

impl fmt::Display for TermValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermValue::Keyword(s) => f.write_str(s),
            TermValue::Long(n) => write!(f, "{n}"),
            TermValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for TermValue {
    fn from(value: &str) -> Self {
        TermValue::Keyword(value.to_string())
    }
}

impl From<String> for TermValue {
    fn from(value: String) -> Self {
        TermValue::Keyword(value)
    }
}

impl From<i64> for TermValue {
    fn from(value: i64) -> Self {
        TermValue::Long(value)
    }
}

impl From<bool> for TermValue {
    fn from(value: bool) -> Self {
        TermValue::Bool(value)
    }
}

/// One side of a range predicate
#[derive(Debug, Clone, PartialEq)]
pub enum RangeBound {
    Number(f64),
    Date(NaiveDate),
    /// Store-evaluated date math such as `now-30d/d`
    DateMath(String),
}

impl RangeBound {
    /// Start of the day `days` days before now, as store-side date math.
    pub fn days_ago(days: u32) -> Self {
        RangeBound::DateMath(format!("now-{days}d/d"))
    }
}

impl fmt::Display for RangeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeBound::Number(n) => write!(f, "{n}"),
            RangeBound::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            RangeBound::DateMath(expr) => f.write_str(expr),
        }
    }
}

impl From<f64> for RangeBound {
    fn from(value: f64) -> Self {
        RangeBound::Number(value)
    }
}

impl From<i64> for RangeBound {
    fn from(value: i64) -> Self {
        RangeBound::Number(value as f64)
    }
}

impl From<NaiveDate> for RangeBound {
    fn from(value: NaiveDate) -> Self {
        RangeBound::Date(value)
    }
}

/// Clause lists of a boolean filter.
///
/// Only constructible through [`BoolFilterBuilder`], which rejects the
/// all-empty case.
#[derive(Debug, Clone, PartialEq)]
pub struct BoolFilter {
    must: Vec<FilterExpression>,
    should: Vec<FilterExpression>,
    must_not: Vec<FilterExpression>,
    filter: Vec<FilterExpression>,
}

impl BoolFilter {
    pub fn builder() -> BoolFilterBuilder {
        BoolFilterBuilder::default()
    }

    pub fn must(&self) -> &[FilterExpression] {
        &self.must
    }

    pub fn should(&self) -> &[FilterExpression] {
        &self.should
    }

    pub fn must_not(&self) -> &[FilterExpression] {
        &self.must_not
    }

    /// Non-scoring required clauses
    pub fn filter(&self) -> &[FilterExpression] {
        &self.filter
    }
}

#[derive(Debug, Clone, Default)]
pub struct BoolFilterBuilder {
    must: Vec<FilterExpression>,
    should: Vec<FilterExpression>,
    must_not: Vec<FilterExpression>,
    filter: Vec<FilterExpression>,
}

impl BoolFilterBuilder {
    pub fn must(mut self, expr: FilterExpression) -> Self {
        self.must.push(expr);
        self
    }

    pub fn should(mut self, expr: FilterExpression) -> Self {
        self.should.push(expr);
        self
    }

    pub fn must_not(mut self, expr: FilterExpression) -> Self {
        self.must_not.push(expr);
        self
    }

    pub fn filter(mut self, expr: FilterExpression) -> Self {
        self.filter.push(expr);
        self
    }

    pub fn build(self) -> Result<FilterExpression> {
        if self.must.is_empty()
            && self.should.is_empty()
            && self.must_not.is_empty()
            && self.filter.is_empty()
        {
            return Err(Error::validation(
                "bool filter needs at least one clause; omit the filter instead",
            ));
        }
        Ok(FilterExpression::Bool(BoolFilter {
            must: self.must,
            should: self.should,
            must_not: self.must_not,
            filter: self.filter,
        }))
    }
}

fn check_field(field: &str) -> Result<()> {
    if field.trim().is_empty() {
        return Err(Error::validation("field name must not be empty"));
    }
    Ok(())
}

/// Exact match on `field`
pub fn term(field: impl Into<String>, value: impl Into<TermValue>) -> Result<FilterExpression> {
    let field = field.into();
    check_field(&field)?;
    Ok(FilterExpression::Term {
        field,
        value: value.into(),
    })
}

/// Full-text match on `field`
pub fn match_text(field: impl Into<String>, text: impl Into<String>) -> Result<FilterExpression> {
    let field = field.into();
    check_field(&field)?;
    Ok(FilterExpression::Match {
        field,
        text: text.into(),
    })
}

/// Inclusive range on `field`; at least one bound is required
pub fn range(
    field: impl Into<String>,
    gte: Option<RangeBound>,
    lte: Option<RangeBound>,
) -> Result<FilterExpression> {
    let field = field.into();
    check_field(&field)?;
    if gte.is_none() && lte.is_none() {
        return Err(Error::validation(format!(
            "range on '{field}' must have at least one bound"
        )));
    }
    Ok(FilterExpression::Range { field, gte, lte })
}

/// All of `exprs` must hold
pub fn and(exprs: impl IntoIterator<Item = FilterExpression>) -> Result<FilterExpression> {
    exprs
        .into_iter()
        .fold(BoolFilter::builder(), BoolFilterBuilder::must)
        .build()
}

/// At least one of `exprs` must hold
pub fn or(exprs: impl IntoIterator<Item = FilterExpression>) -> Result<FilterExpression> {
    exprs
        .into_iter()
        .fold(BoolFilter::builder(), BoolFilterBuilder::should)
        .build()
}

/// `expr` must not hold
pub fn not(expr: FilterExpression) -> Result<FilterExpression> {
    BoolFilter::builder().must_not(expr).build()
}
