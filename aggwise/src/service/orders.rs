//! Order search and analytics operations
//!
//! Every aggregation operation builds one request with hits suppressed,
//! executes it once and projects the decoded result.

use crate::aggregations::{AggregationNode, AggregationSet, CalendarInterval};
use crate::backends::{DocumentRepository, Hit};
use crate::config::AnalyticsConfig;
use crate::error::{Error, Result};
use crate::models::{
    OrderDocument, CATEGORY_FIELD, CUSTOMER_FIELD, ORDER_DATE_FIELD, ORDER_ID_FIELD,
    STATUS_FIELD, TOTAL_AMOUNT_FIELD,
};
use crate::projection::{
    group_counts, project_buckets, scalar_or_zero, CategoryStats, CustomerOrderStats,
    CustomerRevenue, DailySalesStats, GroupCounts, MinMax, RevenueStats,
};
use crate::query::{
    and, match_text, range, term, FilterExpression, QueryRequest, QueryRequestBuilder, RangeBound,
    SortField,
};
use crate::service::QueryService;
use std::sync::Arc;

/// Hit cap for searches that have no explicit page
pub const UNPAGED_HITS: usize = 10_000;

const TOTAL_ORDERS: &str = "total_orders";
const TOTAL_REVENUE: &str = "total_revenue";
const AVG_ORDER_VALUE: &str = "avg_order_value";
const MIN_AMOUNT: &str = "min_amount";
const MAX_AMOUNT: &str = "max_amount";
const ORDERS_BY_STATUS: &str = "orders_by_status";
const REVENUE_PER_CUSTOMER: &str = "revenue_per_customer";
const PAID_REVENUE: &str = "paid_revenue";
const TOP_CUSTOMERS: &str = "top_customers";
const ORDERS_BY_CUSTOMER: &str = "orders_by_customer";
const DAILY_SALES: &str = "daily_sales";
const ORDERS_BY_CATEGORY: &str = "orders_by_category";
const GROUPS: &str = "groups";

pub struct OrderAnalytics {
    queries: QueryService,
    repository: Arc<dyn DocumentRepository<OrderDocument>>,
    config: AnalyticsConfig,
}

impl OrderAnalytics {
    pub fn new(
        queries: QueryService,
        repository: Arc<dyn DocumentRepository<OrderDocument>>,
        config: AnalyticsConfig,
    ) -> Self {
        Self {
            queries,
            repository,
            config,
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    // ========================================================================
    // Repository
    // ========================================================================

    /// Store an order, assigning an id when it has none
    pub async fn add_order(&self, order: OrderDocument) -> Result<OrderDocument> {
        self.repository.save(order).await
    }

    pub async fn find_by_customer(&self, customer: &str) -> Result<Vec<OrderDocument>> {
        self.repository.find_by_field(CUSTOMER_FIELD, customer).await
    }

    /// Orders whose amount is strictly greater than `amount`
    pub async fn find_by_amount_greater_than(&self, amount: f64) -> Result<Vec<OrderDocument>> {
        let filter = range(TOTAL_AMOUNT_FIELD, Some(amount.into()), None)?;
        let orders = self
            .search("find_by_amount_greater_than", Some(filter), |b| b)
            .await?;
        Ok(orders
            .into_iter()
            .filter(|o| o.total_amount > amount)
            .collect())
    }

    // ========================================================================
    // Document search
    // ========================================================================

    pub async fn orders_by_customer(&self, customer: &str) -> Result<Vec<OrderDocument>> {
        let filter = term(CUSTOMER_FIELD, customer)?;
        self.search("orders_by_customer", Some(filter), |b| b).await
    }

    pub async fn orders_by_status(&self, status: &str) -> Result<Vec<OrderDocument>> {
        let filter = match_text(STATUS_FIELD, status)?;
        self.search("orders_by_status", Some(filter), |b| b).await
    }

    pub async fn orders_in_amount_range(
        &self,
        gte: Option<f64>,
        lte: Option<f64>,
    ) -> Result<Vec<OrderDocument>> {
        let filter = range(
            TOTAL_AMOUNT_FIELD,
            gte.map(RangeBound::from),
            lte.map(RangeBound::from),
        )?;
        self.search("orders_in_amount_range", Some(filter), |b| b)
            .await
    }

    /// Paid orders with an amount of at least `min_amount`
    pub async fn paid_orders_above(&self, min_amount: f64) -> Result<Vec<OrderDocument>> {
        let filter = and([
            self.paid()?,
            range(TOTAL_AMOUNT_FIELD, Some(min_amount.into()), None)?,
        ])?;
        self.search("paid_orders_above", Some(filter), |b| b).await
    }

    /// One page of all orders sorted on `sort_field`
    pub async fn orders_sorted(
        &self,
        sort_field: &str,
        page: usize,
        size: usize,
        descending: bool,
    ) -> Result<Vec<OrderDocument>> {
        if sort_field.trim().is_empty() {
            return Err(Error::validation("sort field must not be empty"));
        }
        let sort = if descending {
            SortField::desc(sort_field)
        } else {
            SortField::asc(sort_field)
        };
        self.search("orders_sorted", None, |b| b.sort(sort).page(page, size))
            .await
    }

    /// The `size` largest orders by amount
    pub async fn top_orders(&self, size: usize) -> Result<Vec<OrderDocument>> {
        self.search("top_orders", None, |b| {
            b.sort(SortField::desc(TOTAL_AMOUNT_FIELD)).page(0, size)
        })
        .await
    }

    // ========================================================================
    // Aggregations: whole index
    // ========================================================================

    pub async fn total_orders_count(&self) -> Result<u64> {
        let request = QueryRequest::builder()
            .aggregation(TOTAL_ORDERS, AggregationNode::value_count(ORDER_ID_FIELD)?)
            .no_hits()
            .build()?;
        let decoded = self.queries.aggregate("total_orders_count", &request).await?;
        Ok(decoded.scalar(TOTAL_ORDERS).unwrap_or(0.0) as u64)
    }

    pub async fn total_revenue(&self) -> Result<f64> {
        let request = QueryRequest::builder()
            .aggregation(TOTAL_REVENUE, AggregationNode::sum(TOTAL_AMOUNT_FIELD)?)
            .no_hits()
            .build()?;
        let decoded = self.queries.aggregate("total_revenue", &request).await?;
        Ok(scalar_or_zero(decoded.get(TOTAL_REVENUE)))
    }

    pub async fn average_order_value(&self) -> Result<f64> {
        let request = QueryRequest::builder()
            .aggregation(AVG_ORDER_VALUE, AggregationNode::avg(TOTAL_AMOUNT_FIELD)?)
            .no_hits()
            .build()?;
        let decoded = self.queries.aggregate("average_order_value", &request).await?;
        Ok(scalar_or_zero(decoded.get(AVG_ORDER_VALUE)))
    }

    /// Smallest and largest order amount; both `None` for an empty index
    pub async fn min_max_amount(&self) -> Result<MinMax> {
        let request = QueryRequest::builder()
            .aggregation(MIN_AMOUNT, AggregationNode::min(TOTAL_AMOUNT_FIELD)?)
            .aggregation(MAX_AMOUNT, AggregationNode::max(TOTAL_AMOUNT_FIELD)?)
            .no_hits()
            .build()?;
        let decoded = self.queries.aggregate("min_max_amount", &request).await?;
        Ok(MinMax::from_scalars(
            decoded.get(MIN_AMOUNT),
            decoded.get(MAX_AMOUNT),
        ))
    }

    /// Order count per status, most frequent first
    pub async fn orders_grouped_by_status(&self) -> Result<GroupCounts> {
        let request = QueryRequest::builder()
            .aggregation(
                ORDERS_BY_STATUS,
                AggregationNode::terms(STATUS_FIELD, self.config.status_buckets)?,
            )
            .no_hits()
            .build()?;
        let decoded = self
            .queries
            .aggregate("orders_grouped_by_status", &request)
            .await?;
        Ok(decoded
            .get(ORDERS_BY_STATUS)
            .map(group_counts)
            .unwrap_or_default())
    }

    /// Order count per combination of `fields`, keys joined with `|`
    pub async fn group_counts<F: Into<String>>(
        &self,
        fields: impl IntoIterator<Item = F>,
        size: usize,
    ) -> Result<GroupCounts> {
        let request = QueryRequest::builder()
            .aggregation(GROUPS, AggregationNode::multi_terms(fields, size)?)
            .no_hits()
            .build()?;
        let decoded = self.queries.aggregate("group_counts", &request).await?;
        Ok(decoded.get(GROUPS).map(group_counts).unwrap_or_default())
    }

    pub async fn revenue_per_customer(&self) -> Result<Vec<CustomerRevenue>> {
        self.customer_revenue("revenue_per_customer", REVENUE_PER_CUSTOMER, None)
            .await
    }

    /// Per-customer revenue counting only orders of at least `min_amount`
    pub async fn high_value_orders_per_customer(
        &self,
        min_amount: f64,
    ) -> Result<Vec<CustomerRevenue>> {
        let filter = range(TOTAL_AMOUNT_FIELD, Some(min_amount.into()), None)?;
        self.customer_revenue(
            "high_value_orders_per_customer",
            REVENUE_PER_CUSTOMER,
            Some(filter),
        )
        .await
    }

    // ========================================================================
    // Aggregations: paid orders
    // ========================================================================

    pub async fn paid_revenue_total(&self) -> Result<f64> {
        let request = QueryRequest::builder()
            .filter(self.paid()?)
            .aggregation(PAID_REVENUE, AggregationNode::sum(TOTAL_AMOUNT_FIELD)?)
            .no_hits()
            .build()?;
        let decoded = self.queries.aggregate("paid_revenue_total", &request).await?;
        Ok(scalar_or_zero(decoded.get(PAID_REVENUE)))
    }

    /// Revenue statistics over paid orders; every field is `0.0` without data
    pub async fn paid_revenue_stats(&self) -> Result<RevenueStats> {
        let request = QueryRequest::builder()
            .filter(self.paid()?)
            .aggregation(
                RevenueStats::TOTAL_REVENUE,
                AggregationNode::sum(TOTAL_AMOUNT_FIELD)?,
            )
            .aggregation(
                RevenueStats::AVG_ORDER_VALUE,
                AggregationNode::avg(TOTAL_AMOUNT_FIELD)?,
            )
            .aggregation(
                RevenueStats::MIN_ORDER_AMOUNT,
                AggregationNode::min(TOTAL_AMOUNT_FIELD)?,
            )
            .aggregation(
                RevenueStats::MAX_ORDER_AMOUNT,
                AggregationNode::max(TOTAL_AMOUNT_FIELD)?,
            )
            .no_hits()
            .build()?;
        let decoded = self.queries.aggregate("paid_revenue_stats", &request).await?;
        Ok(RevenueStats::from_scalars(
            decoded.get(RevenueStats::TOTAL_REVENUE),
            decoded.get(RevenueStats::AVG_ORDER_VALUE),
            decoded.get(RevenueStats::MIN_ORDER_AMOUNT),
            decoded.get(RevenueStats::MAX_ORDER_AMOUNT),
        ))
    }

    pub async fn top_customers_by_revenue(&self) -> Result<Vec<CustomerRevenue>> {
        self.customer_revenue(
            "top_customers_by_revenue",
            TOP_CUSTOMERS,
            Some(self.paid()?),
        )
        .await
    }

    /// Paid-order statistics per customer over the last `lookback_days`
    /// days, defaulting to the configured window
    pub async fn customer_order_stats(
        &self,
        lookback_days: Option<u32>,
    ) -> Result<Vec<CustomerOrderStats>> {
        let node = AggregationNode::terms_with(
            CUSTOMER_FIELD,
            self.config.customer_buckets,
            AggregationSet::from_entries([
                (
                    CustomerOrderStats::AVG_ORDER_VALUE,
                    AggregationNode::avg(TOTAL_AMOUNT_FIELD)?,
                ),
                (
                    CustomerOrderStats::MAX_ORDER_VALUE,
                    AggregationNode::max(TOTAL_AMOUNT_FIELD)?,
                ),
            ])?,
        )?;
        let request = QueryRequest::builder()
            .filter(self.recent_paid(lookback_days)?)
            .aggregation(ORDERS_BY_CUSTOMER, node)
            .no_hits()
            .build()?;
        let decoded = self
            .queries
            .aggregate("customer_order_stats", &request)
            .await?;
        Ok(decoded
            .get(ORDERS_BY_CUSTOMER)
            .map(project_buckets)
            .unwrap_or_default())
    }

    /// Per-day sales of one customer, counting orders of at least
    /// `min_amount` (configured default when `None`)
    pub async fn daily_sales_for_customer(
        &self,
        customer: &str,
        min_amount: Option<f64>,
    ) -> Result<Vec<DailySalesStats>> {
        let min_amount = min_amount.unwrap_or(self.config.min_daily_amount);
        let filter = and([
            match_text(CUSTOMER_FIELD, customer)?,
            range(TOTAL_AMOUNT_FIELD, Some(min_amount.into()), None)?,
        ])?;
        let node = AggregationNode::date_histogram_with(
            ORDER_DATE_FIELD,
            CalendarInterval::Day,
            AggregationSet::from_entries([
                (
                    DailySalesStats::TOTAL_SALES,
                    AggregationNode::sum(TOTAL_AMOUNT_FIELD)?,
                ),
                (
                    DailySalesStats::AVG_SALES,
                    AggregationNode::avg(TOTAL_AMOUNT_FIELD)?,
                ),
            ])?,
        )?;
        let request = QueryRequest::builder()
            .filter(filter)
            .aggregation(DAILY_SALES, node)
            .no_hits()
            .build()?;
        let decoded = self
            .queries
            .aggregate("daily_sales_for_customer", &request)
            .await?;
        Ok(decoded
            .get(DAILY_SALES)
            .map(project_buckets)
            .unwrap_or_default())
    }

    /// Paid-order sales per category over the last `lookback_days` days
    pub async fn category_stats(&self, lookback_days: Option<u32>) -> Result<Vec<CategoryStats>> {
        let node = AggregationNode::terms_with(
            CATEGORY_FIELD,
            self.config.category_buckets,
            AggregationSet::from_entries([
                (
                    CategoryStats::TOTAL_SALES,
                    AggregationNode::sum(TOTAL_AMOUNT_FIELD)?,
                ),
                (
                    CategoryStats::AVG_SALES,
                    AggregationNode::avg(TOTAL_AMOUNT_FIELD)?,
                ),
                (
                    CategoryStats::MAX_SALE,
                    AggregationNode::max(TOTAL_AMOUNT_FIELD)?,
                ),
            ])?,
        )?;
        let request = QueryRequest::builder()
            .filter(self.recent_paid(lookback_days)?)
            .aggregation(ORDERS_BY_CATEGORY, node)
            .no_hits()
            .build()?;
        let decoded = self.queries.aggregate("category_stats", &request).await?;
        Ok(decoded
            .get(ORDERS_BY_CATEGORY)
            .map(project_buckets)
            .unwrap_or_default())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn paid(&self) -> Result<FilterExpression> {
        term(STATUS_FIELD, self.config.paid_status.as_str())
    }

    fn recent_paid(&self, lookback_days: Option<u32>) -> Result<FilterExpression> {
        let days = lookback_days.unwrap_or(self.config.lookback_days);
        and([
            self.paid()?,
            range(ORDER_DATE_FIELD, Some(RangeBound::days_ago(days)), None)?,
        ])
    }

    async fn customer_revenue(
        &self,
        operation: &str,
        name: &str,
        filter: Option<FilterExpression>,
    ) -> Result<Vec<CustomerRevenue>> {
        let node = AggregationNode::terms(CUSTOMER_FIELD, self.config.top_customers)?
            .with_sub_aggregation(
                CustomerRevenue::TOTAL_SPENT,
                AggregationNode::sum(TOTAL_AMOUNT_FIELD)?,
            )?;
        let mut builder = QueryRequest::builder().aggregation(name, node).no_hits();
        if let Some(filter) = filter {
            builder = builder.filter(filter);
        }
        let request = builder.build()?;
        let decoded = self.queries.aggregate(operation, &request).await?;
        Ok(decoded.get(name).map(project_buckets).unwrap_or_default())
    }

    async fn search(
        &self,
        operation: &str,
        filter: Option<FilterExpression>,
        shape: impl FnOnce(QueryRequestBuilder) -> QueryRequestBuilder,
    ) -> Result<Vec<OrderDocument>> {
        let mut builder = QueryRequest::builder().max_hits(UNPAGED_HITS);
        if let Some(filter) = filter {
            builder = builder.filter(filter);
        }
        let request = shape(builder).build()?;
        let response = self.queries.execute(operation, &request).await?;
        response.hits.into_iter().map(order_from_hit).collect()
    }
}

fn order_from_hit(hit: Hit) -> Result<OrderDocument> {
    let order: OrderDocument = serde_json::from_value(hit.source)
        .map_err(|e| Error::Repository(format!("hit {} is not an order: {e}", hit.id)))?;
    Ok(order.with_id(hit.id))
}
