//! EsClient tests against a fake Elasticsearch.
//!
//! Each test starts an Axum server on a random port that answers the two
//! endpoints the client uses and records what it was sent.

use aggwise::backends::{DocumentRepository, SearchClient};
use aggwise::config::AnalyticsConfig;
use aggwise::query::QueryRequest;
use aggwise::{Error, OrderAnalytics, OrderDocument, QueryService, TransportError};
use aggwise_es::EsClient;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

// ---------------------------------------------------------------------------
// Fake server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Recorded {
    /// Raw request path, before percent-decoding
    path: String,
    params: HashMap<String, String>,
    authorization: Option<String>,
    body: Value,
}

#[derive(Clone)]
struct FakeEs {
    search_response: Arc<Value>,
    searches: Arc<Mutex<Vec<Recorded>>>,
    indexed: Arc<Mutex<Vec<(String, Recorded)>>>,
}

fn record(
    uri: &Uri,
    params: HashMap<String, String>,
    headers: &HeaderMap,
    body: Value,
) -> Recorded {
    Recorded {
        path: uri.path().to_string(),
        params,
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body,
    }
}

async fn search(
    State(es): State<FakeEs>,
    Path(index): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    match index.as_str() {
        "missing" => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": {
                    "root_cause": [],
                    "type": "index_not_found_exception",
                    "reason": "no such index [missing]"
                },
                "status": 404
            })),
        )
            .into_response(),
        "slow" => {
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            Json(es.search_response.as_ref().clone()).into_response()
        }
        "garbled" => (StatusCode::OK, "not json").into_response(),
        _ => {
            es.searches.lock().await.push(record(&uri, params, &headers, body));
            Json(es.search_response.as_ref().clone()).into_response()
        }
    }
}

async fn index_doc(
    State(es): State<FakeEs>,
    Path((_index, id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    es.indexed
        .lock()
        .await
        .push((id.clone(), record(&uri, params, &headers, body)));
    (
        StatusCode::CREATED,
        Json(json!({"_id": id, "result": "created"})),
    )
        .into_response()
}

async fn start_fake_es(search_response: Value) -> (FakeEs, String) {
    let es = FakeEs {
        search_response: Arc::new(search_response),
        searches: Arc::new(Mutex::new(Vec::new())),
        indexed: Arc::new(Mutex::new(Vec::new())),
    };
    let router = Router::new()
        .route("/:index/_search", post(search))
        .route("/:index/_doc/:id", put(index_doc))
        .with_state(es.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (es, format!("http://{}", addr))
}

fn revenue_response() -> Value {
    json!({
        "took": 2,
        "timed_out": false,
        "hits": {"total": {"value": 3, "relation": "eq"}, "max_score": null, "hits": []},
        "aggregations": {
            "sterms#revenue_per_customer": {
                "doc_count_error_upper_bound": 0,
                "sum_other_doc_count": 0,
                "buckets": [
                    {"key": "A", "doc_count": 2, "sum#total_spent": {"value": 150.0}},
                    {"key": "B", "doc_count": 1}
                ]
            }
        }
    })
}

fn hits_response() -> Value {
    json!({
        "hits": {
            "total": {"value": 1, "relation": "eq"},
            "hits": [{
                "_index": "orders",
                "_id": "doc-1",
                "_source": {
                    "order_id": "o-1",
                    "customer": "A",
                    "order_date": "2024-06-01",
                    "total_amount": 100.0,
                    "status": "PAID"
                }
            }]
        }
    })
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_revenue_per_customer_end_to_end() {
    let (es, url) = start_fake_es(revenue_response()).await;
    let client = Arc::new(EsClient::new(&url, "orders", 2_000).unwrap());
    let analytics = OrderAnalytics::new(
        QueryService::new(client.clone()),
        client,
        AnalyticsConfig::default(),
    );

    let rows = analytics.revenue_per_customer().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].customer, "A");
    assert_eq!(rows[0].total_spent, 150.0);
    // Sub-aggregation missing from the bucket projects to zero
    assert_eq!(rows[1].customer, "B");
    assert_eq!(rows[1].total_spent, 0.0);

    let searches = es.searches.lock().await;
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].params.get("typed_keys").map(String::as_str), Some("true"));
    assert_eq!(searches[0].body["size"], json!(0));
    assert_eq!(
        searches[0].body["aggs"]["revenue_per_customer"]["terms"],
        json!({"field": "customer", "size": 5})
    );
    assert!(searches[0].authorization.is_none());
}

#[tokio::test]
async fn test_basic_auth_header_sent() {
    let (es, url) = start_fake_es(hits_response()).await;
    let client = EsClient::new(&url, "orders", 2_000)
        .unwrap()
        .with_basic_auth("elastic", Some("changeme"));

    let request = QueryRequest::builder().build().unwrap();
    client.execute(&request).await.unwrap();

    let searches = es.searches.lock().await;
    // base64("elastic:changeme")
    assert_eq!(
        searches[0].authorization.as_deref(),
        Some("Basic ZWxhc3RpYzpjaGFuZ2VtZQ==")
    );
}

#[tokio::test]
async fn test_status_error_carries_reason() {
    let (_es, url) = start_fake_es(hits_response()).await;
    let client = EsClient::new(&url, "missing", 2_000).unwrap();

    let err = client
        .execute(&QueryRequest::default())
        .await
        .unwrap_err();
    match err {
        TransportError::Status { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "no such index [missing]");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_reports_configured_limit() {
    let (_es, url) = start_fake_es(hits_response()).await;
    let client = EsClient::new(&url, "slow", 100).unwrap();

    let err = client
        .execute(&QueryRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Timeout(100)));
}

#[tokio::test]
async fn test_unparseable_body_is_malformed() {
    let (_es, url) = start_fake_es(hits_response()).await;
    let client = EsClient::new(&url, "garbled", 2_000).unwrap();

    let err = client
        .execute(&QueryRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = Arc::new(EsClient::new(&format!("http://{addr}"), "orders", 2_000).unwrap());
    let analytics = OrderAnalytics::new(
        QueryService::new(client.clone()),
        client,
        AnalyticsConfig::default(),
    );
    let err = analytics.total_revenue().await.unwrap_err();
    assert!(matches!(
        err,
        Error::QueryExecution(TransportError::Connection(_))
    ));
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_save_assigns_id_and_waits_for_refresh() {
    let (es, url) = start_fake_es(hits_response()).await;
    let client = EsClient::new(&url, "orders", 2_000).unwrap();

    let order = OrderDocument::new(
        "o-9",
        "C",
        NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
        75.5,
        "PENDING",
    );
    let saved = client.save(order).await.unwrap();
    let id = saved.id.clone().unwrap();
    assert!(!id.is_empty());

    let indexed = es.indexed.lock().await;
    assert_eq!(indexed.len(), 1);
    assert_eq!(indexed[0].0, id);
    assert_eq!(
        indexed[0].1.params.get("refresh").map(String::as_str),
        Some("wait_for")
    );
    assert_eq!(indexed[0].1.body["order_id"], "o-9");
    assert_eq!(indexed[0].1.body["total_amount"], json!(75.5));
    assert!(indexed[0].1.body.get("id").is_none());
}

#[tokio::test]
async fn test_save_keeps_existing_id() {
    let (es, url) = start_fake_es(hits_response()).await;
    let client = EsClient::new(&url, "orders", 2_000).unwrap();

    let order = OrderDocument::new(
        "o-1",
        "A",
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        100.0,
        "PAID",
    )
    .with_id("fixed");
    let saved = client.save(order).await.unwrap();
    assert_eq!(saved.id.as_deref(), Some("fixed"));
    assert_eq!(es.indexed.lock().await[0].0, "fixed");
}

#[tokio::test]
async fn test_save_encodes_reserved_characters_in_id() {
    let (es, url) = start_fake_es(hits_response()).await;
    let client = EsClient::new(&url, "orders", 2_000).unwrap();

    let id = "../../other_index/_doc/x?refresh=false#";
    let order = OrderDocument::new(
        "o-7",
        "A",
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        10.0,
        "PAID",
    )
    .with_id(id);
    let saved = client.save(order).await.unwrap();
    assert_eq!(saved.id.as_deref(), Some(id));

    let indexed = es.indexed.lock().await;
    assert_eq!(indexed.len(), 1);
    // one segment on the wire, decoded back to the caller's id
    assert_eq!(indexed[0].0, id);
    let path = &indexed[0].1.path;
    assert!(path.starts_with("/orders/_doc/"), "path was {path}");
    assert_eq!(path.matches('/').count(), 3, "path was {path}");
    assert!(path.contains("%2F") && path.contains("%3F") && path.contains("%23"));
    assert_eq!(indexed[0].1.params.len(), 1);
    assert_eq!(
        indexed[0].1.params.get("refresh").map(String::as_str),
        Some("wait_for")
    );
}

#[tokio::test]
async fn test_save_rejects_dot_segment_id() {
    let (es, url) = start_fake_es(hits_response()).await;
    let client = EsClient::new(&url, "orders", 2_000).unwrap();

    let order = OrderDocument::new(
        "o-8",
        "A",
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        10.0,
        "PAID",
    )
    .with_id("..");
    let err = client.save(order).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(es.indexed.lock().await.is_empty());
}

#[tokio::test]
async fn test_find_by_field_uses_term_query() {
    let (es, url) = start_fake_es(hits_response()).await;
    let client = EsClient::new(&url, "orders", 2_000).unwrap();

    let found = client.find_by_field("customer", "A").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id.as_deref(), Some("doc-1"));
    assert_eq!(found[0].order_id, "o-1");
    assert_eq!(found[0].total_amount, 100.0);

    let searches = es.searches.lock().await;
    assert_eq!(
        searches[0].body["query"],
        json!({"term": {"customer": {"value": "A"}}})
    );
    assert_eq!(searches[0].body["size"], json!(10_000));
}
