//! Order document model
//!
//! Field names follow the fixed `orders_pagination` index mapping.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const ORDER_ID_FIELD: &str = "order_id";
pub const CUSTOMER_FIELD: &str = "customer";
pub const CATEGORY_FIELD: &str = "category";
pub const ORDER_DATE_FIELD: &str = "order_date";
pub const TOTAL_AMOUNT_FIELD: &str = "total_amount";
pub const STATUS_FIELD: &str = "status";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDocument {
    /// Document id; assigned on save when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub order_id: String,
    pub customer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub order_date: NaiveDate,
    #[serde(alias = "totalAmount")]
    pub total_amount: f64,
    pub status: String,
}

impl OrderDocument {
    pub fn new(
        order_id: impl Into<String>,
        customer: impl Into<String>,
        order_date: NaiveDate,
        total_amount: f64,
        status: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            order_id: order_id.into(),
            customer: customer.into(),
            category: None,
            order_date,
            total_amount,
            status: status.into(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialization_uses_index_field_names() {
        let doc = OrderDocument::new(
            "o-1",
            "alice",
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            120.5,
            "PAID",
        )
        .with_category("books");

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["order_date"], "2024-05-01");
        assert_eq!(value["total_amount"], 120.5);
        assert_eq!(value["category"], "books");
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_deserialize_accepts_camel_case_amount() {
        let doc: OrderDocument = serde_json::from_value(json!({
            "order_id": "o-2",
            "customer": "bob",
            "order_date": "2024-05-02",
            "totalAmount": 80.0,
            "status": "PENDING"
        }))
        .unwrap();
        assert_eq!(doc.total_amount, 80.0);
        assert!(doc.category.is_none());
    }
}
