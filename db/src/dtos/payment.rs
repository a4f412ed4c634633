use sqlx::types::JsonValue;
use uuid::Uuid;

pub struct PaymentItemCreateRequest {
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
