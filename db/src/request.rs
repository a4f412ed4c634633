use chrono::NaiveDateTime;
use common::{
    error::{AppError, Res},
    misc::RequestStatus,
};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    dtos::request::{RequestAcceptRequest, RequestCreateRequest},
    models::request::FamilyRequest,
};

pub async fn get_request_by_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    request_id: Uuid,
) -> Res<Option<FamilyRequest>> {
    sqlx::query_as::<_, FamilyRequest>("SELECT * FROM family_requests WHERE id = $1")
        .bind(request_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

/// Same as [`get_request_by_id`] but holds a row lock until the transaction ends.
pub async fn get_request_for_update<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    request_id: Uuid,
) -> Res<Option<FamilyRequest>> {
    sqlx::query_as::<_, FamilyRequest>("SELECT * FROM family_requests WHERE id = $1 FOR UPDATE")
        .bind(request_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_request_by_code<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    code: &str,
) -> Res<Option<FamilyRequest>> {
    sqlx::query_as::<_, FamilyRequest>("SELECT * FROM family_requests WHERE code = $1")
        .bind(code)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_requests_by_master_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    master_subscription_id: Uuid,
) -> Res<Vec<FamilyRequest>> {
    sqlx::query_as::<_, FamilyRequest>(
        "SELECT * FROM family_requests WHERE master_subscription_id = $1 ORDER BY created_at, code",
    )
    .bind(master_subscription_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_request_by_slave_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    slave_subscription_id: Uuid,
) -> Res<Option<FamilyRequest>> {
    sqlx::query_as::<_, FamilyRequest>(
        "SELECT * FROM family_requests WHERE slave_subscription_id = $1",
    )
    .bind(slave_subscription_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn exists_accepted_request_for_user<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    master_subscription_id: Uuid,
    slave_user_id: Uuid,
) -> Res<bool> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM family_requests
            WHERE master_subscription_id = $1 AND slave_user_id = $2 AND status = 'accepted'
        )
        "#,
    )
    .bind(master_subscription_id)
    .bind(slave_user_id)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn insert_request<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: RequestCreateRequest,
) -> Res<FamilyRequest> {
    sqlx::query_as::<_, FamilyRequest>(
        r#"
        INSERT INTO family_requests
            (code, master_user_id, master_subscription_id, slave_plan_id, status, expires_at, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
        RETURNING *
        "#,
    )
    .bind(data.code)
    .bind(data.master_user_id)
    .bind(data.master_subscription_id)
    .bind(data.slave_plan_id)
    .bind(RequestStatus::Created.as_str())
    .bind(data.expires_at)
    .bind(data.now)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

/// Moves a request from `created` to `accepted`. Returns `None` when the
/// request was no longer `created`, i.e. somebody else got there first.
pub async fn accept_request<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    request_id: Uuid,
    data: RequestAcceptRequest,
) -> Res<Option<FamilyRequest>> {
    sqlx::query_as::<_, FamilyRequest>(
        r#"
        UPDATE family_requests
        SET status = $1, slave_user_id = $2, accepted_at = $3, updated_at = $3
        WHERE id = $4 AND status = $5
        RETURNING *
        "#,
    )
    .bind(RequestStatus::Accepted.as_str())
    .bind(data.slave_user_id)
    .bind(data.now)
    .bind(request_id)
    .bind(RequestStatus::Created.as_str())
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn link_request_slave_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    request_id: Uuid,
    slave_subscription_id: Uuid,
) -> Res<FamilyRequest> {
    sqlx::query_as::<_, FamilyRequest>(
        "UPDATE family_requests SET slave_subscription_id = $1 WHERE id = $2 RETURNING *",
    )
    .bind(slave_subscription_id)
    .bind(request_id)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn cancel_request<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    request_id: Uuid,
    now: NaiveDateTime,
) -> Res<Option<FamilyRequest>> {
    sqlx::query_as::<_, FamilyRequest>(
        r#"
        UPDATE family_requests
        SET status = $1, canceled_at = $2, updated_at = $2
        WHERE id = $3 AND status = $4
        RETURNING *
        "#,
    )
    .bind(RequestStatus::Canceled.as_str())
    .bind(now)
    .bind(request_id)
    .bind(RequestStatus::Accepted.as_str())
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

/// Stamps `opened_at` only the first time.
pub async fn mark_request_opened<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    request_id: Uuid,
    now: NaiveDateTime,
) -> Res<FamilyRequest> {
    sqlx::query_as::<_, FamilyRequest>(
        "UPDATE family_requests SET opened_at = COALESCE(opened_at, $1) WHERE id = $2 RETURNING *",
    )
    .bind(now)
    .bind(request_id)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn update_request_note<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    request_id: Uuid,
    note: Option<String>,
    now: NaiveDateTime,
) -> Res<FamilyRequest> {
    sqlx::query_as::<_, FamilyRequest>(
        "UPDATE family_requests SET note = $1, updated_at = $2 WHERE id = $3 RETURNING *",
    )
    .bind(note)
    .bind(now)
    .bind(request_id)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn update_request_expiry<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    request_id: Uuid,
    expires_at: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> Res<FamilyRequest> {
    sqlx::query_as::<_, FamilyRequest>(
        "UPDATE family_requests SET expires_at = $1, updated_at = $2 WHERE id = $3 RETURNING *",
    )
    .bind(expires_at)
    .bind(now)
    .bind(request_id)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}
