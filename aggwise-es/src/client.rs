//! HTTP client for an Elasticsearch-compatible store
//!
//! Implements both consumed interfaces of the core crate: [`SearchClient`]
//! for queries and [`DocumentRepository`] for single order documents. No
//! retries happen here; the first failure is returned.

use crate::error::EsError;
use crate::response::ResponseParser;
use crate::translator::RequestTranslator;
use aggwise::backends::{DocumentRepository, RawResponse, SearchClient};
use aggwise::config::StoreConfig;
use aggwise::query::{term, QueryRequest};
use aggwise::service::orders::UNPAGED_HITS;
use aggwise::{Error, OrderDocument, TransportError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Client for one index of an ES cluster
#[derive(Debug, Clone)]
pub struct EsClient {
    client: Client,
    base_url: String,
    index: String,
    timeout_ms: u64,
    credentials: Option<(String, Option<String>)>,
}

impl EsClient {
    /// Create a client for `index` at `url`
    pub fn new(url: &str, index: &str, timeout_ms: u64) -> Result<Self, EsError> {
        let parsed = Url::parse(url).map_err(|e| EsError::InvalidUrl(format!("{url}: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(EsError::InvalidUrl(format!("{url}: not a base URL")));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            index: index.to_string(),
            timeout_ms,
            credentials: None,
        })
    }

    /// Create a client from the `[store]` config section
    pub fn from_config(config: &StoreConfig) -> Result<Self, EsError> {
        let client = Self::new(&config.url, &config.index, config.timeout_ms)?;
        Ok(match &config.username {
            Some(user) => client.with_basic_auth(user, config.password.as_deref()),
            None => client,
        })
    }

    pub fn with_basic_auth(mut self, username: &str, password: Option<&str>) -> Self {
        self.credentials = Some((username.to_string(), password.map(String::from)));
        self
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, password.as_ref()),
            None => builder,
        }
    }

    /// Base URL followed by `segments`, each percent-encoded as one path segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url, EsError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| EsError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| EsError::InvalidUrl(format!("{}: not a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a built request and return the JSON body of a 2xx answer
    async fn send(&self, builder: RequestBuilder) -> Result<Value, EsError> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| EsError::from_request(e, self.timeout_ms))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| EsError::from_request(e, self.timeout_ms))?;

        if !status.is_success() {
            return Err(EsError::from_status(status.as_u16(), &text));
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Run a search against the index with typed aggregation keys
    pub async fn search(&self, request: &QueryRequest) -> Result<RawResponse, EsError> {
        let body = RequestTranslator::translate(request);
        let url = self.endpoint(&[self.index.as_str(), "_search"])?;
        debug!(index = %self.index, "Sending search request");

        let json = self
            .send(
                self.client
                    .post(url)
                    .query(&[("typed_keys", "true")])
                    .json(&body),
            )
            .await?;
        ResponseParser::parse(&json)
    }

    /// Index `source` under `id`, waiting until it is searchable.
    ///
    /// `id` is sent as a single path segment; `/`, `?` and `#` in it are
    /// percent-encoded. The dot segments `.` and `..` are rejected.
    pub async fn index_document(&self, id: &str, source: &Value) -> Result<(), EsError> {
        if matches!(id, "" | "." | "..") {
            return Err(EsError::InvalidUrl(format!("invalid document id {id:?}")));
        }
        let url = self.endpoint(&[self.index.as_str(), "_doc", id])?;
        self.send(
            self.client
                .put(url)
                .query(&[("refresh", "wait_for")])
                .json(source),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SearchClient for EsClient {
    async fn execute(&self, request: &QueryRequest) -> Result<RawResponse, TransportError> {
        self.search(request).await.map_err(|e| {
            warn!(index = %self.index, "Search failed: {}", e);
            TransportError::from(e)
        })
    }
}

#[async_trait]
impl DocumentRepository<OrderDocument> for EsClient {
    async fn save(&self, mut doc: OrderDocument) -> aggwise::Result<OrderDocument> {
        let id = doc
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        if matches!(id.as_str(), "" | "." | "..") {
            return Err(Error::validation(format!("invalid order id {id:?}")));
        }
        doc.id = Some(id.clone());

        let mut source = serde_json::to_value(&doc)?;
        if let Value::Object(map) = &mut source {
            map.remove("id");
        }

        self.index_document(&id, &source)
            .await
            .map_err(|e| Error::Repository(format!("failed to index order {id}: {e}")))?;
        debug!(index = %self.index, id = %id, "Indexed order");
        Ok(doc)
    }

    async fn find_by_field(&self, field: &str, value: &str) -> aggwise::Result<Vec<OrderDocument>> {
        let request = QueryRequest::builder()
            .filter(term(field, value)?)
            .max_hits(UNPAGED_HITS)
            .build()?;
        let response = self.search(&request).await.map_err(TransportError::from)?;

        response
            .hits
            .into_iter()
            .map(|hit| {
                let doc: OrderDocument = serde_json::from_value(hit.source).map_err(|e| {
                    Error::Repository(format!("order {} does not deserialize: {e}", hit.id))
                })?;
                Ok(doc.with_id(hit.id))
            })
            .collect()
    }
}
