//! Fixtures shared by the unit tests.

use chrono::{NaiveDate, NaiveDateTime};
use db::{
    dtos::{payment::PaymentItemCreateRequest, subscription::SubscriptionCreateRequest},
    models::subscription::Subscription,
};
use uuid::Uuid;

use crate::{
    memory::MemoryBackend,
    provisioning::{ITEM_TYPE_FAMILY, ITEM_TYPE_SUBSCRIPTION},
};

/// Midnight of a day in January 2025; day 0 and 32+ roll into the neighbours.
pub fn day(n: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::days(n - 1)
}

pub fn now() -> NaiveDateTime {
    day(15)
}

pub async fn subscription_between(
    backend: &MemoryBackend,
    user_id: Uuid,
    plan_id: Uuid,
    start_time: NaiveDateTime,
    end_time: NaiveDateTime,
) -> Subscription {
    backend
        .add_subscription(SubscriptionCreateRequest {
            user_id,
            plan_id,
            start_time,
            end_time,
            is_paid: true,
            origin: "purchase".to_string(),
        })
        .await
}

/// Runs from the 1st of January to the 1st of February, so it is live at [`now`].
pub async fn running_subscription(
    backend: &MemoryBackend,
    user_id: Uuid,
    plan_id: Uuid,
) -> Subscription {
    subscription_between(backend, user_id, plan_id, day(1), day(32)).await
}

fn item(payment_id: Uuid, item_type: &str, plan_id: Uuid, count: i32) -> PaymentItemCreateRequest {
    PaymentItemCreateRequest {
        payment_id,
        item_type: item_type.to_string(),
        plan_id: Some(plan_id),
        unit_count: count,
        unit_price: 500,
        vat: None,
        no_vat: false,
        name: None,
        meta: serde_json::json!({}),
    }
}

pub fn plan_item(payment_id: Uuid, plan_id: Uuid, count: i32) -> PaymentItemCreateRequest {
    item(payment_id, ITEM_TYPE_SUBSCRIPTION, plan_id, count)
}

pub fn family_item(payment_id: Uuid, plan_id: Uuid, count: i32) -> PaymentItemCreateRequest {
    item(payment_id, ITEM_TYPE_FAMILY, plan_id, count)
}
