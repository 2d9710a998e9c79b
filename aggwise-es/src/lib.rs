//! Elasticsearch wire layer for aggwise
//!
//! Turns [`aggwise::query::QueryRequest`]s into ES search bodies, sends them
//! with `typed_keys=true` and parses the answer into
//! [`aggwise::backends::RawResponse`]s for the core decoder.
//!
//! # Query DSL
//!
//! - `match_all`, `term`, `match`, `range`
//! - `bool` (must, should, must_not, filter)
//!
//! # Aggregations
//!
//! - `sum` / `avg` / `min` / `max` / `value_count`
//! - `terms` / `multi_terms`
//! - `date_histogram` with `calendar_interval`

pub mod client;
pub mod dsl;
pub mod error;
pub mod response;
pub mod translator;

pub use client::EsClient;
pub use error::EsError;
pub use response::ResponseParser;
pub use translator::RequestTranslator;

/// Result type for ES operations
pub type Result<T> = std::result::Result<T, EsError>;
