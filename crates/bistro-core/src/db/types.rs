//! Input types for the bistro database.

use chrono::{DateTime, Utc};

/// Input for creating a promotion.
///
/// `promotion_type` and `target_type` are stored as their wire
/// strings; `conditions` is the raw JSON map decoded into typed
/// conditions when the row is read back.
#[derive(Debug, Clone)]
pub struct NewPromotion {
    pub id: String,
    pub restaurant_id: String,
    pub name: String,
    pub promotion_type: String,
    pub discount_value: f64,
    pub max_discount_amount: Option<f64>,
    pub min_order_amount: Option<f64>,
    pub target_type: String,
    pub target_items: Vec<String>,
    pub conditions: serde_json::Value,
    pub stackable: bool,
    pub priority: i32,
    pub auto_apply: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub usage_limit: Option<i64>,
    pub per_customer_limit: Option<i64>,
    pub customer_tiers: Vec<String>,
}

/// Input for creating a coupon.
#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub id: String,
    pub code: String,
    pub promotion_id: String,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub max_uses: Option<i64>,
    pub customer_id: Option<String>,
}

/// Input for creating a dining table.
#[derive(Debug, Clone)]
pub struct NewTable {
    pub id: String,
    pub restaurant_id: String,
    pub name: String,
    pub capacity: i32,
    pub status: String,
}

/// Input for opening a table session.
#[derive(Debug, Clone)]
pub struct NewTableSession {
    pub id: String,
    pub restaurant_id: String,
    pub table_id: String,
    pub start_time: DateTime<Utc>,
    pub guest_count: i32,
    pub server_id: Option<String>,
}
