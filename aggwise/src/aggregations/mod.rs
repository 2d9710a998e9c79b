pub mod builder;
pub mod decode;
pub mod types;
pub mod value;

pub use decode::{AggregationDecoder, DecodedAggregations};
pub use types::{AggregationNode, AggregationSet, CalendarInterval, MetricKind};
pub use value::{AggregateValue, Bucket, BucketKey, COMPOSITE_KEY_SEPARATOR};
