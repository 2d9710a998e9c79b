//! HTTP router
//!
//! # Endpoints
//!
//! - `POST /orders/add` - Store an order
//! - `GET /orders/fetch-by-customer/{customer}` - Term search on customer
//! - `GET /orders/match-by-status/{status}` - Match search on status
//! - `GET /orders/orders-by-range?gte&lte` - Amount range search
//! - `GET /orders/combinequeries?minAmount` - Paid orders above an amount
//! - `GET /orders/sort-and-pagination?field&page&size&desc` - Sorted page
//! - `GET /orders/top?size` - Largest orders
//! - `GET /orders/aggs-*` - Aggregation reports
//! - `GET /health`, `GET /metrics`

use crate::routes;
use aggwise::OrderAnalytics;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub analytics: Arc<OrderAnalytics>,
    /// `None` when metrics are disabled
    pub metrics: Option<PrometheusHandle>,
}

pub fn router(state: AppState) -> Router {
    let orders = Router::new()
        .route("/add", post(routes::add_order))
        .route(
            "/fetch-by-customer/:customer",
            get(routes::fetch_by_customer),
        )
        .route("/match-by-status/:status", get(routes::match_by_status))
        .route("/orders-by-range", get(routes::orders_by_range))
        .route("/combinequeries", get(routes::combine_queries))
        .route("/sort-and-pagination", get(routes::sort_and_pagination))
        .route("/top", get(routes::top_orders))
        .route(
            "/aggs-total-orders-count",
            get(routes::total_orders_count),
        )
        .route("/aggs-total-revenue", get(routes::total_revenue))
        .route("/aggs-total-avg", get(routes::average_order_value))
        .route("/aggs-min-max", get(routes::min_max))
        .route("/aggs-group-by-status", get(routes::group_by_status))
        .route("/aggs-group-by", get(routes::group_by_fields))
        .route(
            "/aggs-revenue-by-customer",
            get(routes::revenue_by_customer),
        )
        .route("/high-value", get(routes::high_value))
        .route("/aggs-paid-revenue", get(routes::paid_revenue))
        .route("/aggs-paid-revenue-stats", get(routes::paid_revenue_stats))
        .route("/aggs-top-customers", get(routes::top_customers))
        .route("/aggs-customer-stats", get(routes::customer_stats))
        .route("/aggs-daily-sales/:customer", get(routes::daily_sales))
        .route("/aggs-category-stats", get(routes::category_stats));

    Router::new()
        .nest("/orders", orders)
        .route("/health", get(routes::health))
        .route("/metrics", get(routes::metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
