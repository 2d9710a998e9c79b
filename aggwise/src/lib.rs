pub mod aggregations;
pub mod backends;
pub mod config;
pub mod error;
pub mod models;
pub mod projection;
pub mod query;
pub mod service;
pub mod telemetry;

pub use config::Config;
pub use error::{Error, Result, TransportError};
pub use models::OrderDocument;
pub use service::{OrderAnalytics, QueryService};
