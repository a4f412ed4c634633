use chrono::NaiveDateTime;
use common::misc::RequestStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One redeemable seat of a payer subscription.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct FamilyRequest {
    pub id: Uuid,
    pub code: String,
    pub master_user_id: Uuid,
    pub master_subscription_id: Uuid,
    pub slave_plan_id: Uuid,
    pub slave_subscription_id: Option<Uuid>,
    pub slave_user_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub status: RequestStatus,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub opened_at: Option<NaiveDateTime>,
    pub accepted_at: Option<NaiveDateTime>,
    pub canceled_at: Option<NaiveDateTime>,
    pub expires_at: Option<NaiveDateTime>,
}

impl FamilyRequest {
    /// Still redeemable: never accepted, never canceled.
    pub fn is_unused(&self) -> bool {
        self.status == RequestStatus::Created && self.slave_user_id.is_none()
    }

    pub fn is_expired_at(&self, now: NaiveDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}
