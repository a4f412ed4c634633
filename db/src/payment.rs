use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    dtos::payment::PaymentItemCreateRequest,
    models::payment::{Payment, PaymentItem},
};

pub async fn get_payment_by_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    payment_id: Uuid,
) -> Res<Option<Payment>> {
    sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
        .bind(payment_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

/// The purchase a subscription originated from, latest first if several.
pub async fn get_payment_by_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    subscription_id: Uuid,
) -> Res<Option<Payment>> {
    sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE subscription_id = $1 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(subscription_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_payment_items<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    payment_id: Uuid,
    item_type: &str,
) -> Res<Vec<PaymentItem>> {
    sqlx::query_as::<_, PaymentItem>(
        "SELECT * FROM payment_items WHERE payment_id = $1 AND item_type = $2 ORDER BY id",
    )
    .bind(payment_id)
    .bind(item_type)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_payment_meta<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    payment_id: Uuid,
    key: &str,
) -> Res<Option<String>> {
    sqlx::query_scalar::<_, String>(
        "SELECT value FROM payment_meta WHERE payment_id = $1 AND key = $2",
    )
    .bind(payment_id)
    .bind(key)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn insert_payment_item<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: PaymentItemCreateRequest,
) -> Res<PaymentItem> {
    sqlx::query_as::<_, PaymentItem>(
        r#"
        INSERT INTO payment_items (payment_id, item_type, plan_id, unit_count, unit_price, vat, no_vat, name, meta)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(data.payment_id)
    .bind(data.item_type)
    .bind(data.plan_id)
    .bind(data.unit_count)
    .bind(data.unit_price)
    .bind(data.vat)
    .bind(data.no_vat)
    .bind(data.name)
    .bind(data.meta)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}
