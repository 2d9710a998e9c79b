//! Order route handlers

use crate::error::ApiError;
use crate::router::AppState;
use aggwise::projection::{
    CategoryStats, CustomerOrderStats, CustomerRevenue, DailySalesStats, GroupCounts, MinMax,
    RevenueStats,
};
use aggwise::OrderDocument;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

type ApiResult<T> = Result<Json<T>, ApiError>;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Prometheus text exposition; 404 when metrics are disabled
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

// ============================================================================
// Documents
// ============================================================================

pub async fn add_order(
    State(state): State<AppState>,
    Json(order): Json<OrderDocument>,
) -> ApiResult<OrderDocument> {
    Ok(Json(state.analytics.add_order(order).await?))
}

pub async fn fetch_by_customer(
    State(state): State<AppState>,
    Path(customer): Path<String>,
) -> ApiResult<Vec<OrderDocument>> {
    Ok(Json(state.analytics.orders_by_customer(&customer).await?))
}

pub async fn match_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> ApiResult<Vec<OrderDocument>> {
    Ok(Json(state.analytics.orders_by_status(&status).await?))
}

#[derive(Debug, Deserialize)]
pub struct AmountRange {
    #[serde(default = "default_range_gte")]
    gte: Option<f64>,
    #[serde(default = "default_range_lte")]
    lte: Option<f64>,
}

fn default_range_gte() -> Option<f64> {
    Some(100.0)
}

fn default_range_lte() -> Option<f64> {
    Some(600.0)
}

pub async fn orders_by_range(
    State(state): State<AppState>,
    Query(params): Query<AmountRange>,
) -> ApiResult<Vec<OrderDocument>> {
    Ok(Json(
        state
            .analytics
            .orders_in_amount_range(params.gte, params.lte)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinAmount {
    #[serde(default = "default_combined_min")]
    min_amount: f64,
}

fn default_combined_min() -> f64 {
    300.0
}

pub async fn combine_queries(
    State(state): State<AppState>,
    Query(params): Query<MinAmount>,
) -> ApiResult<Vec<OrderDocument>> {
    Ok(Json(
        state.analytics.paid_orders_above(params.min_amount).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct SortAndPage {
    #[serde(default = "default_sort_field")]
    field: String,
    #[serde(default)]
    page: usize,
    #[serde(default = "default_page_size")]
    size: usize,
    #[serde(default = "default_true")]
    desc: bool,
}

fn default_sort_field() -> String {
    aggwise::models::TOTAL_AMOUNT_FIELD.to_string()
}

fn default_page_size() -> usize {
    5
}

fn default_true() -> bool {
    true
}

pub async fn sort_and_pagination(
    State(state): State<AppState>,
    Query(params): Query<SortAndPage>,
) -> ApiResult<Vec<OrderDocument>> {
    Ok(Json(
        state
            .analytics
            .orders_sorted(&params.field, params.page, params.size, params.desc)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct TopParams {
    #[serde(default = "default_top_size")]
    size: usize,
}

fn default_top_size() -> usize {
    3
}

pub async fn top_orders(
    State(state): State<AppState>,
    Query(params): Query<TopParams>,
) -> ApiResult<Vec<OrderDocument>> {
    Ok(Json(state.analytics.top_orders(params.size).await?))
}

// ============================================================================
// Aggregations
// ============================================================================

pub async fn total_orders_count(State(state): State<AppState>) -> ApiResult<u64> {
    Ok(Json(state.analytics.total_orders_count().await?))
}

pub async fn total_revenue(State(state): State<AppState>) -> ApiResult<f64> {
    Ok(Json(state.analytics.total_revenue().await?))
}

pub async fn average_order_value(State(state): State<AppState>) -> ApiResult<f64> {
    Ok(Json(state.analytics.average_order_value().await?))
}

pub async fn min_max(State(state): State<AppState>) -> ApiResult<MinMax> {
    Ok(Json(state.analytics.min_max_amount().await?))
}

pub async fn group_by_status(State(state): State<AppState>) -> ApiResult<GroupCounts> {
    Ok(Json(state.analytics.orders_grouped_by_status().await?))
}

#[derive(Debug, Deserialize)]
pub struct GroupByParams {
    /// Comma-separated field list
    fields: String,
    #[serde(default = "default_group_size")]
    size: usize,
}

fn default_group_size() -> usize {
    10
}

pub async fn group_by_fields(
    State(state): State<AppState>,
    Query(params): Query<GroupByParams>,
) -> ApiResult<GroupCounts> {
    let fields: Vec<&str> = params
        .fields
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();
    Ok(Json(
        state.analytics.group_counts(fields, params.size).await?,
    ))
}

pub async fn revenue_by_customer(
    State(state): State<AppState>,
) -> ApiResult<Vec<CustomerRevenue>> {
    Ok(Json(state.analytics.revenue_per_customer().await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighValueParams {
    min_amount: f64,
}

pub async fn high_value(
    State(state): State<AppState>,
    Query(params): Query<HighValueParams>,
) -> ApiResult<Vec<CustomerRevenue>> {
    Ok(Json(
        state
            .analytics
            .high_value_orders_per_customer(params.min_amount)
            .await?,
    ))
}

pub async fn paid_revenue(State(state): State<AppState>) -> ApiResult<f64> {
    Ok(Json(state.analytics.paid_revenue_total().await?))
}

pub async fn paid_revenue_stats(State(state): State<AppState>) -> ApiResult<RevenueStats> {
    Ok(Json(state.analytics.paid_revenue_stats().await?))
}

pub async fn top_customers(State(state): State<AppState>) -> ApiResult<Vec<CustomerRevenue>> {
    Ok(Json(state.analytics.top_customers_by_revenue().await?))
}

#[derive(Debug, Deserialize)]
pub struct LookbackParams {
    days: Option<u32>,
}

pub async fn customer_stats(
    State(state): State<AppState>,
    Query(params): Query<LookbackParams>,
) -> ApiResult<Vec<CustomerOrderStats>> {
    Ok(Json(
        state.analytics.customer_order_stats(params.days).await?,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySalesParams {
    min_amount: Option<f64>,
}

pub async fn daily_sales(
    State(state): State<AppState>,
    Path(customer): Path<String>,
    Query(params): Query<DailySalesParams>,
) -> ApiResult<Vec<DailySalesStats>> {
    Ok(Json(
        state
            .analytics
            .daily_sales_for_customer(&customer, params.min_amount)
            .await?,
    ))
}

pub async fn category_stats(
    State(state): State<AppState>,
    Query(params): Query<LookbackParams>,
) -> ApiResult<Vec<CategoryStats>> {
    Ok(Json(state.analytics.category_stats(params.days).await?))
}
