pub mod memory;
pub mod r#trait;

pub use memory::InMemoryStore;
pub use r#trait::{
    DocumentRepository, Hit, KeyPart, RawAggregate, RawBucket, RawResponse, SearchClient,
};
