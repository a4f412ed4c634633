use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::types::JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subscription_id: Option<Uuid>,
    /// Set when this payment is a recurring charge against an earlier one.
    pub recurring_parent_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct PaymentItem {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub item_type: String,
    pub plan_id: Option<Uuid>,
    pub unit_count: i32,
    pub unit_price: i64,
    pub vat: Option<i64>,
    pub no_vat: bool,
    pub name: Option<String>,
    pub meta: JsonValue,
}
