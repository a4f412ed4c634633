use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

pub async fn get_subscription_meta<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    subscription_id: Uuid,
    key: &str,
) -> Res<Option<String>> {
    sqlx::query_scalar::<_, String>(
        "SELECT value FROM subscription_meta WHERE subscription_id = $1 AND key = $2",
    )
    .bind(subscription_id)
    .bind(key)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn set_subscription_meta<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    subscription_id: Uuid,
    key: &str,
    value: &str,
) -> Res<()> {
    sqlx::query(
        r#"
        INSERT INTO subscription_meta (subscription_id, key, value)
        VALUES ($1, $2, $3)
        ON CONFLICT (subscription_id, key) DO UPDATE SET value = EXCLUDED.value
        "#,
    )
    .bind(subscription_id)
    .bind(key)
    .bind(value)
    .execute(executor)
    .await?;
    Ok(())
}
