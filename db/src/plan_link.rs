use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::plan_link::PlanLink;

pub async fn get_plan_link_by_master_plan<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    master_plan_id: Uuid,
) -> Res<Option<PlanLink>> {
    sqlx::query_as::<_, PlanLink>("SELECT * FROM family_plan_links WHERE master_plan_id = $1")
        .bind(master_plan_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

/// Every plan that acts as a payer plan; renewals are matched within this set.
pub async fn get_master_plan_ids<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
) -> Res<Vec<Uuid>> {
    sqlx::query_scalar::<_, Uuid>("SELECT master_plan_id FROM family_plan_links")
        .fetch_all(executor)
        .await
        .map_err(AppError::from)
}
