use chrono::NaiveDateTime;
use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    dtos::subscription::{LineageFilter, SubscriptionCreateRequest, SubscriptionRangeUpdate},
    models::subscription::Subscription,
};

pub async fn get_subscription_by_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    subscription_id: Uuid,
) -> Res<Option<Subscription>> {
    sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE id = $1")
        .bind(subscription_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

/// Row-locks a subscription for the rest of the transaction. Used to
/// serialize work on one payer subscription's request set.
pub async fn lock_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    subscription_id: Uuid,
) -> Res<()> {
    sqlx::query("SELECT id FROM subscriptions WHERE id = $1 FOR UPDATE")
        .bind(subscription_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn insert_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: SubscriptionCreateRequest,
) -> Res<Subscription> {
    sqlx::query_as::<_, Subscription>(
        r#"
        INSERT INTO subscriptions (user_id, plan_id, start_time, end_time, is_paid, origin)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(data.user_id)
    .bind(data.plan_id)
    .bind(data.start_time)
    .bind(data.end_time)
    .bind(data.is_paid)
    .bind(data.origin)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn update_subscription_range<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    subscription_id: Uuid,
    data: SubscriptionRangeUpdate,
) -> Res<Subscription> {
    sqlx::query_as::<_, Subscription>(
        r#"
        UPDATE subscriptions
        SET start_time = $1, end_time = $2, updated_at = (NOW() AT TIME ZONE 'utc')
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(data.start_time)
    .bind(data.end_time)
    .bind(subscription_id)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

/// Ends a subscription at `now` unless it has already ended. A subscription
/// that has not started yet collapses onto its start.
pub async fn stop_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    subscription_id: Uuid,
    now: NaiveDateTime,
) -> Res<bool> {
    let result = sqlx::query(
        r#"
        UPDATE subscriptions
        SET end_time = GREATEST(start_time, $1), updated_at = $1
        WHERE id = $2 AND end_time > $1
        "#,
    )
    .bind(now)
    .bind(subscription_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_lineage_candidates<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    filter: LineageFilter,
) -> Res<Vec<Subscription>> {
    sqlx::query_as::<_, Subscription>(
        r#"
        SELECT * FROM subscriptions
        WHERE user_id = $1
          AND plan_id = ANY($2)
          AND end_time BETWEEN $3 AND $4
          AND id <> $5
        ORDER BY end_time DESC
        "#,
    )
    .bind(filter.user_id)
    .bind(filter.plan_ids)
    .bind(filter.ending_after)
    .bind(filter.ending_before)
    .bind(filter.exclude_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

/// Latest end time among the user's subscriptions of `plan_id` that are
/// still running at `now`.
pub async fn get_latest_running_end_time<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    plan_id: Uuid,
    now: NaiveDateTime,
) -> Res<Option<NaiveDateTime>> {
    sqlx::query_scalar::<_, Option<NaiveDateTime>>(
        "SELECT MAX(end_time) FROM subscriptions WHERE user_id = $1 AND plan_id = $2 AND end_time > $3",
    )
    .bind(user_id)
    .bind(plan_id)
    .bind(now)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}
