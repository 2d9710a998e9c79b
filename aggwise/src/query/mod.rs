pub mod filter;
pub mod request;

pub use filter::{
    and, match_text, not, or, range, term, BoolFilter, BoolFilterBuilder, FilterExpression,
    RangeBound, TermValue,
};
pub use request::{Page, QueryRequest, QueryRequestBuilder, SortField, SortOrder};
